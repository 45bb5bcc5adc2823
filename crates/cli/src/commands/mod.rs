pub(crate) mod health;
pub(crate) mod locate;
pub(crate) mod tables;
