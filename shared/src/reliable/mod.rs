pub mod engine;
pub mod error;
pub mod settings;
pub mod stream;

cfg_if! {
    if #[cfg(feature = "kcp_engine")] {
        pub mod kcp_engine;
    } else {}
}
