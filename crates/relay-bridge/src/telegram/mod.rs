pub mod action;
pub mod api;
pub mod dispatcher;
pub mod navigation;
pub mod replies;
pub mod session_loop;
pub mod transport;
pub mod views;
