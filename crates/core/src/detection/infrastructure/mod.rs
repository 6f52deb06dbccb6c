pub mod cached_face_detector;
pub mod letterbox;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod onnx_session;
pub mod onnx_yolo_detector;
