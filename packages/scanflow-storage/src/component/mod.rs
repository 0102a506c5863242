//! Component services

pub mod permissions;
pub mod tree;

pub use permissions::{StaticUserSession, UserSession};
pub use tree::{
    ComponentTreeService, Paging, TreeComponent, TreeRequest, TreeResponse, TreeStrategy,
    MAX_PAGE_SIZE,
};
