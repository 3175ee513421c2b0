pub mod mock_spamd;
pub mod pki;
