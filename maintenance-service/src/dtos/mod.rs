pub mod bills;

pub use bills::{
    BillListResponse, BillResponse, GenerateBillsRequest, GenerateBillsResponse,
    RecalculateInterestResponse, SingleBillRequest, TransitionRequest,
};
