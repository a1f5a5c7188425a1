pub mod disputes;
pub mod lifecycle;
pub mod pay;
pub mod proof;
pub mod receipt_parse;
pub mod risk;
