//! Pure text interpreters: sales/funded text, revenue estimation, date
//! normalization, campaign status. No I/O and no page handles — everything
//! here is a plain function over strings, so the whole layer is
//! table-testable.

pub mod dates;
pub mod revenue;
pub mod sales;
pub mod status;
