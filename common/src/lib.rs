pub mod alert;
pub mod category;
pub mod currency;
pub mod error;
pub mod identity;
pub mod insight;
pub mod matching;
pub mod order;
pub mod policy;
pub mod quotation;
pub mod rfq;
pub mod sample;
