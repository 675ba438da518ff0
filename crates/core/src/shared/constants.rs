pub const DEFAULT_MODEL_PATH: &str = "models/eye_direction_model.onnx";
pub const DEFAULT_FACE_CASCADE_PATH: &str = "models/haarcascade_frontalface_default.xml";
pub const DEFAULT_EYE_CASCADE_PATH: &str = "models/haarcascade_eye_tree_eyeglasses.xml";

/// Width and height of each eye crop and of the combined model input.
pub const DEFAULT_INPUT_SHAPE: (u32, u32) = (64, 64);

/// Run the full-frame face search at least every N frames, even while tracking.
pub const DEFAULT_DETECTION_INTERVAL: usize = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
