use anyhow::{anyhow, Result};
use core::slice;
use jni::{
    objects::{JObject, JValueGen},
    sys::{JNIInvokeInterface_, _jobject},
    JNIEnv, JavaVM,
};
use log::{debug, error, info, warn};
use ndk_sys::{
    acamera_metadata_tag, camera_status_t, media_status_t, ACameraCaptureSession,
    ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stateCallbacks, ACameraCaptureSession_stopRepeating, ACameraDevice,
    ACameraDevice_StateCallbacks, ACameraDevice_close, ACameraDevice_createCaptureRequest,
    ACameraDevice_createCaptureSession, ACameraDevice_getId, ACameraDevice_request_template,
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, ACameraMetadata,
    ACameraMetadata_const_entry, ACameraMetadata_free, ACameraMetadata_getConstEntry,
    ACameraOutputTarget, ACameraOutputTarget_create, ACameraOutputTarget_free, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureSessionOutput,
    ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, AImage, AImageReader,
    AImageReader_ImageListener, AImageReader_acquireLatestImage, AImageReader_delete,
    AImageReader_getFormat, AImageReader_getHeight, AImageReader_getWidth, AImageReader_getWindow,
    AImageReader_new, AImageReader_setImageListener, AImage_delete, AImage_getPlaneData,
    AImage_getPlanePixelStride, AImage_getPlaneRowStride, ANativeWindow, AIMAGE_FORMATS,
};
use std::{
    ffi::{c_int, c_void, CStr},
    mem::zeroed,
    ptr::null_mut,
    sync::mpsc::Sender,
    time::Instant,
};

use super::{select_rear_camera, upright_preview, yuv::YuvPlanes, CameraEvent, CameraInfo};
use crate::{detector::QrDetector, error::ScanError, geometry::SensorOrientation};

#[link(name = "camera2ndk")]
extern "C" {}

#[link(name = "mediandk")]
extern "C" {}

const CAMERA_PERMISSION: &str = "android.permission.CAMERA";

pub struct AndroidCamera {
    app: slint::android::AndroidApp,
    camera_device: *mut ACameraDevice,
    capture_request: *mut ACaptureRequest,
    camera_output_target: *mut ACameraOutputTarget,
    session_output: *mut ACaptureSessionOutput,
    capture_session_output_container: *mut ACaptureSessionOutputContainer,
    capture_session: *mut ACameraCaptureSession,
    image_reader: *mut AImageReader,
    camera_id: Option<String>,
    image_listener: AImageReader_ImageListener,
    capture_session_state_callbacks: ACameraCaptureSession_stateCallbacks,
    device_state_callbacks: ACameraDevice_StateCallbacks,
    timer: Instant,
    frame_count: i32,
    detector: QrDetector,
    event_sender: Sender<CameraEvent>,
    sensor_orientation: SensorOrientation,
}

impl AndroidCamera {
    pub fn new(
        app: slint::android::AndroidApp,
        detector: QrDetector,
        event_sender: Sender<CameraEvent>,
    ) -> Self {
        Self {
            app,
            camera_device: null_mut(),
            capture_request: null_mut(),
            camera_output_target: null_mut(),
            session_output: null_mut(),
            capture_session_output_container: null_mut(),
            capture_session: null_mut(),
            image_reader: null_mut(),
            camera_id: None,
            image_listener: AImageReader_ImageListener {
                context: null_mut(),
                onImageAvailable: None,
            },
            capture_session_state_callbacks: unsafe { zeroed() },
            device_state_callbacks: unsafe { zeroed() },
            timer: Instant::now(),
            frame_count: 0,
            detector,
            event_sender,
            sensor_orientation: SensorOrientation::Deg90,
        }
    }

    pub fn sensor_orientation(&self) -> SensorOrientation {
        self.sensor_orientation
    }

    /// 打开默认的后置摄像头；没有权限时发起权限申请并返回 `PermissionDenied`
    pub fn open_back_camera(&mut self) -> Result<()> {
        if !has_camera_permission(&self.app)? {
            request_camera_permission(&self.app)?;
            return Err(ScanError::PermissionDenied.into());
        }
        unsafe {
            let camera_manager = ACameraManager_create();
            let res = self.open_with_manager(camera_manager);
            ACameraManager_delete(camera_manager);
            res
        }
    }

    unsafe fn open_with_manager(&mut self, camera_manager: *mut ACameraManager) -> Result<()> {
        let mut camera_id_list_raw = null_mut();
        let camera_status = ACameraManager_getCameraIdList(camera_manager, &mut camera_id_list_raw);
        if camera_status != camera_status_t::ACAMERA_OK || camera_id_list_raw.is_null() {
            return Err(anyhow!("Failed to get camera id list (reason: {:?})", camera_status));
        }

        let camera_id_list = &*camera_id_list_raw;
        let camera_ids = if camera_id_list.numCameras > 0 {
            slice::from_raw_parts(camera_id_list.cameraIds, camera_id_list.numCameras as usize)
        } else {
            &[]
        };

        let infos: Vec<CameraInfo> = camera_ids
            .iter()
            .map(|cid| {
                let info = camera_info(camera_manager, *cid);
                info!("camera {:?}: {info:?}", get_cstr(*cid));
                info
            })
            .collect();

        let Some((idx, orientation)) = select_rear_camera(&infos) else {
            ACameraManager_deleteCameraIdList(camera_id_list_raw);
            return Err(ScanError::NoCamera.into());
        };
        let selected_camera_id = camera_ids[idx];
        let camera_id = get_cstr(selected_camera_id).unwrap_or("").to_string();
        self.sensor_orientation = orientation;

        unsafe extern "C" fn on_disconnected(_data: *mut c_void, device: *mut ACameraDevice) {
            warn!("camera {:?} disconnected", get_cstr(ACameraDevice_getId(device)));
        }

        unsafe extern "C" fn on_error(_data: *mut c_void, device: *mut ACameraDevice, code: c_int) {
            error!("camera {:?} error {code}", get_cstr(ACameraDevice_getId(device)));
        }

        self.device_state_callbacks.onDisconnected = Some(on_disconnected);
        self.device_state_callbacks.onError = Some(on_error);

        let camera_status = ACameraManager_openCamera(
            camera_manager,
            selected_camera_id,
            &mut self.device_state_callbacks,
            &mut self.camera_device,
        );
        ACameraManager_deleteCameraIdList(camera_id_list_raw);

        if camera_status != camera_status_t::ACAMERA_OK {
            return Err(ScanError::CameraNotFound(camera_id).into());
        }
        info!("opened camera {camera_id} ({:?})", self.sensor_orientation);
        self.camera_id = Some(camera_id);
        Ok(())
    }

    /// 先停会话再关设备，最后释放输出和 ImageReader
    pub fn close(&mut self) {
        unsafe {
            if !self.capture_session.is_null() {
                ACameraCaptureSession_stopRepeating(self.capture_session);
                ACameraCaptureSession_close(self.capture_session);
                self.capture_session = null_mut();
            }
            if !self.camera_device.is_null() {
                if ACameraDevice_close(self.camera_device) != camera_status_t::ACAMERA_OK {
                    error!("failed to close camera {:?}", self.camera_id);
                }
                self.camera_device = null_mut();
            }
            if !self.capture_request.is_null() {
                ACaptureRequest_free(self.capture_request);
                self.capture_request = null_mut();
            }
            if !self.camera_output_target.is_null() {
                ACameraOutputTarget_free(self.camera_output_target);
                self.camera_output_target = null_mut();
            }
            if !self.capture_session_output_container.is_null() {
                ACaptureSessionOutputContainer_free(self.capture_session_output_container);
                self.capture_session_output_container = null_mut();
            }
            if !self.session_output.is_null() {
                ACaptureSessionOutput_free(self.session_output);
                self.session_output = null_mut();
            }
            if !self.image_reader.is_null() {
                AImageReader_delete(self.image_reader);
                self.image_reader = null_mut();
            }
        }
        info!("camera closed");
    }

    pub fn start_preview(&mut self, width: u32, height: u32) -> Result<()> {
        if self.camera_device.is_null() {
            return Err(anyhow!("camera is not open"));
        }
        self.create_image_reader(width, height)?;
        unsafe {
            let camera_status = ACameraDevice_createCaptureRequest(
                self.camera_device,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut self.capture_request,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create preview capture request (id: {:?})",
                    self.camera_id
                ));
            }

            let mut native_window: *mut ANativeWindow = null_mut();
            let res = AImageReader_getWindow(self.image_reader, &mut native_window);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("AImageReader_getWindow error res={:?}.", res));
            }

            ACameraOutputTarget_create(native_window, &mut self.camera_output_target);
            ACaptureRequest_addTarget(self.capture_request, self.camera_output_target);
            ACaptureSessionOutput_create(native_window, &mut self.session_output);

            let camera_status =
                ACaptureSessionOutputContainer_create(&mut self.capture_session_output_container);
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session output container (reason: {:?})",
                    camera_status
                ));
            }
            ACaptureSessionOutputContainer_add(
                self.capture_session_output_container,
                self.session_output,
            );

            unsafe extern "C" fn on_session_active(_: *mut c_void, session: *mut ACameraCaptureSession) {
                info!("capture session {session:?} active");
            }

            unsafe extern "C" fn on_session_closed(_: *mut c_void, session: *mut ACameraCaptureSession) {
                info!("capture session {session:?} closed");
            }

            self.capture_session_state_callbacks.onActive = Some(on_session_active);
            self.capture_session_state_callbacks.onClosed = Some(on_session_closed);

            let camera_status = ACameraDevice_createCaptureSession(
                self.camera_device,
                self.capture_session_output_container,
                &self.capture_session_state_callbacks,
                &mut self.capture_session,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session (reason: {:?})",
                    camera_status
                ));
            }

            // 预览帧由 camera2 在自己的线程回调，这里不会阻塞
            let camera_status = ACameraCaptureSession_setRepeatingRequest(
                self.capture_session,
                null_mut(),
                1,
                &mut self.capture_request,
                null_mut(),
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to set repeating request (reason: {:?})",
                    camera_status
                ));
            }
        }
        Ok(())
    }

    fn on_image_available(&mut self) -> Result<()> {
        unsafe {
            let mut image = null_mut();
            let media_status = AImageReader_acquireLatestImage(self.image_reader, &mut image);
            if media_status != media_status_t::AMEDIA_OK {
                return Err(anyhow!("acquire latest image: {:?}", media_status));
            }
            let res = self.process_image(image);
            AImage_delete(image);
            res
        }
    }

    unsafe fn process_image(&mut self, image: *mut AImage) -> Result<()> {
        let mut format = 0;
        let mut width = 0;
        let mut height = 0;
        if AImageReader_getFormat(self.image_reader, &mut format) != media_status_t::AMEDIA_OK
            || AImageReader_getWidth(self.image_reader, &mut width) != media_status_t::AMEDIA_OK
            || AImageReader_getHeight(self.image_reader, &mut height) != media_status_t::AMEDIA_OK
        {
            return Err(anyhow!("failed to query image reader"));
        }
        if format != AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888.0 as i32 {
            return Err(anyhow!("format is not AIMAGE_FORMAT_YUV_420_888"));
        }

        // 三个平面各取各的长度和步长，不假设它们在内存里连续
        let y = plane_data(image, 0)?;
        let u = plane_data(image, 1)?;
        let v = plane_data(image, 2)?;
        let mut y_row_stride = 0;
        let mut uv_row_stride = 0;
        let mut uv_pixel_stride = 0;
        AImage_getPlaneRowStride(image, 0, &mut y_row_stride);
        AImage_getPlaneRowStride(image, 1, &mut uv_row_stride);
        AImage_getPlanePixelStride(image, 1, &mut uv_pixel_stride);
        let planes = YuvPlanes {
            y,
            y_row_stride: y_row_stride as usize,
            u,
            v,
            uv_row_stride: uv_row_stride as usize,
            uv_pixel_stride: uv_pixel_stride as usize,
        };
        let (width, height) = (width as u32, height as u32);

        // 识别只用亮度，直接在传感器坐标系里做，识别区域已经转换到这个坐标系
        let gray = planes
            .luma(width, height)
            .ok_or_else(|| anyhow!("Y plane shorter than {width}x{height}"))?;
        let objects = self.detector.detect(&gray);
        if !objects.is_empty() {
            self.event_sender
                .send(CameraEvent::Metadata(objects))
                .map_err(|_| anyhow!("camera event receiver dropped"))?;
        }

        let rgba = planes
            .to_rgba(width, height)
            .ok_or_else(|| anyhow!("chroma planes shorter than {width}x{height}"))?;
        self.event_sender
            .send(CameraEvent::Frame(upright_preview(&rgba, self.sensor_orientation)))
            .map_err(|_| anyhow!("camera event receiver dropped"))?;

        self.frame_count += 1;
        if self.timer.elapsed().as_millis() > 1000 {
            debug!("预览 FPS:{}", self.frame_count);
            self.timer = Instant::now();
            self.frame_count = 0;
        }
        Ok(())
    }

    fn create_image_reader(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            let res = AImageReader_new(
                width as i32,
                height as i32,
                AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888.0 as i32,
                2,
                &mut self.image_reader,
            );
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("create Image Reader error."));
            }

            unsafe extern "C" fn on_image_available(context: *mut c_void, _: *mut AImageReader) {
                //还原Camera指针
                let camera = &mut *(context as *mut AndroidCamera);
                if let Err(err) = camera.on_image_available() {
                    debug!("frame dropped: {err}");
                }
            }

            self.image_listener.context = (self as *mut AndroidCamera) as *mut c_void;
            self.image_listener.onImageAvailable = Some(on_image_available);

            let res = AImageReader_setImageListener(self.image_reader, &mut self.image_listener);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("set Image Listener error."));
            }
        }
        Ok(())
    }
}

impl Drop for AndroidCamera {
    fn drop(&mut self) {
        self.close();
    }
}

unsafe fn plane_data<'a>(image: *mut AImage, plane: i32) -> Result<&'a [u8]> {
    let mut data = null_mut();
    let mut len = 0;
    let res = AImage_getPlaneData(image, plane, &mut data, &mut len);
    if res != media_status_t::AMEDIA_OK || data.is_null() || len <= 0 {
        return Err(anyhow!("AImage_getPlaneData({plane}) error res={:?}", res));
    }
    Ok(slice::from_raw_parts(data, len as usize))
}

unsafe fn camera_info(
    camera_manager: *mut ACameraManager,
    camera_id: *const std::os::raw::c_char,
) -> CameraInfo {
    let mut metadata: *mut ACameraMetadata = null_mut();
    if ACameraManager_getCameraCharacteristics(camera_manager, camera_id, &mut metadata)
        != camera_status_t::ACAMERA_OK
    {
        return CameraInfo {
            lens_facing: None,
            sensor_orientation: None,
        };
    }
    let mut entry: ACameraMetadata_const_entry = zeroed();
    let lens_facing = (ACameraMetadata_getConstEntry(
        metadata,
        acamera_metadata_tag::ACAMERA_LENS_FACING.0,
        &mut entry,
    ) == camera_status_t::ACAMERA_OK
        && entry.count > 0)
        .then(|| *entry.data.u8_);
    let mut entry: ACameraMetadata_const_entry = zeroed();
    let sensor_orientation = (ACameraMetadata_getConstEntry(
        metadata,
        acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
        &mut entry,
    ) == camera_status_t::ACAMERA_OK
        && entry.count > 0)
        .then(|| *entry.data.i32_);
    ACameraMetadata_free(metadata);
    CameraInfo {
        lens_facing,
        sensor_orientation,
    }
}

fn has_camera_permission(app: &slint::android::AndroidApp) -> Result<bool> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let granted = env
            .get_static_field("android/content/pm/PackageManager", "PERMISSION_GRANTED", "I")?
            .i()?;
        let permission = env.new_string(CAMERA_PERMISSION)?;
        let activity = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        let result = env
            .call_method(
                activity,
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValueGen::Object(&JObject::from(permission))],
            )?
            .i()?;
        Ok(result == granted)
    }
}

fn request_camera_permission(app: &slint::android::AndroidApp) -> Result<()> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        let res = call_request_permissions(&mut env, &activity);
        if env.exception_check()? {
            env.exception_clear()?;
        }
        res?;
    }
    info!("camera permission requested");
    Ok(())
}

fn call_request_permissions(env: &mut JNIEnv, activity: &JObject) -> jni::errors::Result<()> {
    let permission = env.new_string(CAMERA_PERMISSION)?;
    let permissions = env.new_object_array(1, "java/lang/String", permission)?;
    env.call_method(
        activity,
        "requestPermissions",
        "([Ljava/lang/String;I)V",
        &[JValueGen::Object(&JObject::from(permissions)), 100.into()],
    )?;
    Ok(())
}

unsafe fn get_cstr<'a>(s: *const std::os::raw::c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}
