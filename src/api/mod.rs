pub mod client;
pub mod request_id;
pub mod routes;

pub use client::MusicRecoClient;
