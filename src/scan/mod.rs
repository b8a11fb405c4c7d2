pub mod detect;
pub mod listener;
pub mod queue;
pub mod scanner;

pub use detect::{Detection, detect};
pub use listener::{BlockListener, ListenerEvent, MempoolListener};
pub use queue::{JobQueue, JobSource, ScanJob};
pub use scanner::{ScanEvent, ScannerHandle, SwapScanner};
