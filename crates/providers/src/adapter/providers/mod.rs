pub mod banco_do_brasil;
pub mod cora;
pub mod itau;
pub mod sicredi;
