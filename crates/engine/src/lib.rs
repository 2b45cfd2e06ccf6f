pub mod cell;
pub mod sheet;
pub mod workbook;

pub use cell::{Cell, CellStyle, CellValue, Rgb};
pub use sheet::Sheet;
pub use workbook::Workbook;
