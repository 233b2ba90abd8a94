pub mod finding;
pub mod parsed;
pub mod request;
pub mod report;
pub mod verdict;

pub use finding::*;
pub use parsed::*;
pub use request::*;
pub use report::*;
pub use verdict::*;
