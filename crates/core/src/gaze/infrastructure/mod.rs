pub mod onnx_gaze_model;
