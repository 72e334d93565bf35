use schemars::JsonSchema;
use serde::Deserialize;
use unibridge_core::Params;

/// Smallest and largest accepted resolution multipliers
pub const MIN_RESOLUTION: f64 = 0.1;
pub const MAX_RESOLUTION: f64 = 1.0;

/// Request for capturing the Game or Scene view
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TakeScreenshotRequest {
    /// File name under the project's Screenshots folder; generated when omitted
    #[serde(default)]
    pub file_name: Option<String>,

    /// Resolution multiplier, 0.1 to 1.0
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Capture the Game view (true) or the Scene view (false)
    #[serde(default = "default_true")]
    pub capture_game_view: bool,

    /// Attach the captured PNG to the tool result
    #[serde(default)]
    pub include_image: bool,
}

fn default_resolution() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl TakeScreenshotRequest {
    /// Reject out-of-range resolutions before anything is sent to the editor
    pub fn validate(&self) -> Result<(), String> {
        if (MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution) {
            Ok(())
        } else {
            Err(format!(
                "Resolution must be between {MIN_RESOLUTION:.1} and {MAX_RESOLUTION:.1}"
            ))
        }
    }

    pub fn to_params(&self) -> Params {
        Params::new()
            .with("action", "capture")
            .with("resolution", self.resolution)
            .with("captureGameView", self.capture_game_view)
            .with_opt("fileName", self.file_name.as_deref())
    }
}
