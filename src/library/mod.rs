// Library module
// Turns files on disk into playable tracks

pub mod scanner;
pub mod track;

pub use scanner::DirectoryScanner;
pub use track::Track;
