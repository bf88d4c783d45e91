use url::Url;

use crate::error::{Result, ScanError};

/// Hands a scanned URL over to something that can show it.
pub trait UrlPresenter {
    fn present(&mut self, url: &Url) -> Result<()>;
}

/// 用系统浏览器打开链接
pub struct SystemBrowser {
    #[cfg(target_os = "android")]
    app: slint::android::AndroidApp,
}

impl SystemBrowser {
    pub fn new(#[cfg(target_os = "android")] app: slint::android::AndroidApp) -> Self {
        Self {
            #[cfg(target_os = "android")]
            app,
        }
    }
}

impl UrlPresenter for SystemBrowser {
    fn present(&mut self, url: &Url) -> Result<()> {
        #[cfg(target_os = "android")]
        {
            open_with_intent(&self.app, url).map_err(|err| ScanError::Presenter(format!("{err:#}")))
        }
        #[cfg(not(target_os = "android"))]
        {
            webbrowser::open(url.as_str()).map_err(|err| ScanError::Presenter(err.to_string()))
        }
    }
}

/// 通过 Intent.ACTION_VIEW 交给系统浏览器
///
/// A failed `startActivity` leaves a Java exception pending on this thread;
/// it is cleared before returning so later JNI calls from the UI thread work.
#[cfg(target_os = "android")]
fn open_with_intent(app: &slint::android::AndroidApp, url: &Url) -> anyhow::Result<()> {
    use jni::{
        objects::JObject,
        sys::{JNIInvokeInterface_, _jobject},
        JavaVM,
    };

    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        let res = start_view_activity(&mut env, &activity, url);
        if env.exception_check()? {
            env.exception_describe()?;
            env.exception_clear()?;
        }
        res?;
    }
    Ok(())
}

#[cfg(target_os = "android")]
fn start_view_activity(
    env: &mut jni::JNIEnv,
    activity: &jni::objects::JObject,
    url: &Url,
) -> jni::errors::Result<()> {
    use jni::objects::{JObject, JValueGen};

    let url_str = env.new_string(url.as_str())?;
    let uri = env
        .call_static_method(
            "android/net/Uri",
            "parse",
            "(Ljava/lang/String;)Landroid/net/Uri;",
            &[JValueGen::Object(&JObject::from(url_str))],
        )?
        .l()?;
    let action = env
        .get_static_field("android/content/Intent", "ACTION_VIEW", "Ljava/lang/String;")?
        .l()?;
    let intent = env.new_object(
        "android/content/Intent",
        "(Ljava/lang/String;Landroid/net/Uri;)V",
        &[JValueGen::Object(&action), JValueGen::Object(&uri)],
    )?;
    env.call_method(
        activity,
        "startActivity",
        "(Landroid/content/Intent;)V",
        &[JValueGen::Object(&intent)],
    )?;
    Ok(())
}
