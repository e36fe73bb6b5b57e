pub mod me_api;
