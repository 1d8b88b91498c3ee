//! Binary-side orchestration: context, dispatch, menu and terminal setup.

pub(crate) mod context;
pub(crate) mod exit_handler;
pub(crate) mod menu;
pub(crate) mod runtime;
pub(crate) mod terminal;
