pub mod app;

pub use app::{
    build_router, AppState, CreateTransferRequest, CreateTransferResponse, TransfersResponse,
};
