//! Adapters: concrete implementations of the ports against real
//! infrastructure (payment providers, PostgreSQL, Resend, HTTP).

pub mod email;
pub mod gateway;
pub mod http;
pub mod mercadopago;
pub mod paypal;
pub mod postgres;
