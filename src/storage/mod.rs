pub mod presign;

pub use presign::{ObjectStoreSigner, PresignedRequest};
