//! 주식 데이터 동기화를 위한 도메인 모델.

mod market_data_source;
mod price;
mod repository;
mod stock;
mod sync_record;

pub use market_data_source::*;
pub use price::*;
pub use repository::*;
pub use stock::*;
pub use sync_record::*;
