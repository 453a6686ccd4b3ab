pub mod provider;
pub mod view;
