pub mod mercado_pago_client;
pub mod webhook_signature;
