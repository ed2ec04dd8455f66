//! 장치를 소유하는 캡처 스레드
//!
//! 블로킹 카메라 API는 전용 OS 스레드에서 실행됩니다. [`CaptureThread`]는
//! 정지 플래그와 `JoinHandle`을 함께 보관하여, [`shutdown()`](CaptureThread::shutdown)이
//! 반환되면 스레드 본문이 끝났고 장치가 해제되었음을 보장합니다.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// 정지 플래그와 조인 핸들을 가진 캡처 스레드
pub(crate) struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureThread {
    /// 이름 붙은 스레드에서 `body`를 실행합니다.
    ///
    /// `body`는 정지 플래그를 받으며, 플래그가 설정되면 장치를 해제하고 반환해야 합니다.
    pub(crate) fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || body(thread_stop))?;

        Ok(Self {
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// 정지가 요청되었는지 여부
    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// 정지 플래그를 설정하고 스레드가 끝날 때까지 기다립니다.
    ///
    /// 여러 번 호출해도 안전합니다. 두 번째 호출부터는 아무것도 하지 않습니다.
    /// 캡처 스레드 자신에서 호출되면 조인하지 않고 플래그만 설정합니다.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("capture thread panicked");
        } else {
            debug!("capture thread joined");
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
