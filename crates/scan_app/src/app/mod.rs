//! Terminal presentation for the upload/predict workflow.

pub mod settings;
pub mod view;

use scan_core::WorkflowSnapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Prints every published state until the controller goes away.
pub fn follow_state(mut rx: watch::Receiver<WorkflowSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Vec<String> = Vec::new();
        while rx.changed().await.is_ok() {
            let lines = view::render(&rx.borrow_and_update());
            if lines != last {
                println!("{}", lines.join("\n"));
                println!();
                last = lines;
            }
        }
    })
}
