//! 상품 저장소.
//!
//! - `ProductStore` trait: 집계 코어가 사용하는 저장소 인터페이스
//! - `InMemoryProductStore`: 메모리 기반 구현

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryProductStore;
pub use traits::ProductStore;
