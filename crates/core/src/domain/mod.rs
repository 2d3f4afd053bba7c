pub mod record;
pub mod trip;
