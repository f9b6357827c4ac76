use scan_core::{Phase, WorkflowSnapshot};

/// Renders a snapshot as the lines shown in the terminal.
pub fn render(snapshot: &WorkflowSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    match (&snapshot.selection_name, snapshot.dimensions, snapshot.preview) {
        (Some(name), Some(dims), Some(preview)) => {
            lines.push(format!("Selected: {name} ({dims}px) [{preview}]"));
        }
        _ if snapshot.validating => lines.push("Checking image...".to_string()),
        _ => lines.push("No image selected (minimum resolution: 64x64 pixels)".to_string()),
    }

    if let Some(error) = &snapshot.error {
        lines.push(format!("Error: {error}"));
    }

    if let Some(result) = &snapshot.result {
        let verdict = match snapshot.tumor_detected {
            Some(true) => "tumor detected",
            _ => "no tumor detected",
        };
        lines.push(format!("Prediction Result: {result} ({verdict})"));
    }

    let action = if snapshot.phase == Phase::Predicting {
        "Running Diagnosis...".to_string()
    } else if snapshot.can_run_diagnosis {
        "Run Diagnosis: available".to_string()
    } else {
        "Run Diagnosis: unavailable".to_string()
    };
    lines.push(action);
    lines
}
