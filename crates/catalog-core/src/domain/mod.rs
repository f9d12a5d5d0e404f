//! 카탈로그 도메인 모델.

pub mod change;
pub mod product;
pub mod query;

pub use change::{ChangeKind, ProductChange, ProductMutation};
pub use product::{
    AvailabilityRecord, PriceRecord, Product, ProductDetail, ProductSnapshot, ProviderProduct,
};
pub use query::{Page, Pagination, ProductFilter};
