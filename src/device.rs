use crate::error::TrackerError;
use crate::event::event_codes::EV_KEY;
use crate::event::RawKeyEvent;
use crate::TrackerResult;
use futures::{ready, Stream};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::unix::AsyncFd;
use tracing::{debug, info, warn};

const IOC_NRBITS: libc::c_ulong = 8;
const IOC_TYPEBITS: libc::c_ulong = 8;
const IOC_SIZEBITS: libc::c_ulong = 14;
const IOC_NRSHIFT: libc::c_ulong = 0;
const IOC_TYPESHIFT: libc::c_ulong = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: libc::c_ulong = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: libc::c_ulong = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_READ: libc::c_ulong = 2;

/// Something the capture loop can open to obtain a stream of raw key events.
pub trait EventSource: Send + 'static {
    type Events: Stream<Item = TrackerResult<RawKeyEvent>> + Unpin + Send;

    fn open(self) -> TrackerResult<Self::Events>;
}

impl EventSource for PathBuf {
    type Events = InputDevice;

    fn open(self) -> TrackerResult<InputDevice> {
        InputDevice::open(self)
    }
}

/// An open evdev input node (e.g. `/dev/input/event0`).
///
/// Each element of the stream is one raw event, in arrival order. The stream ends when the
/// device stops producing data (e.g. it was unplugged).
#[derive(Debug)]
pub struct InputDevice {
    name: String,
    path: PathBuf,
    async_fd: AsyncFd<File>,
    pending: VecDeque<RawKeyEvent>,
}

impl InputDevice {
    /// Open the device at `path` for reading.
    ///
    /// This must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>) -> TrackerResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TrackerError::DeviceOpen {
                path: path.clone(),
                source,
            })?;

        Self::from_file(path, file)
    }

    pub(crate) fn from_file(path: PathBuf, file: File) -> TrackerResult<Self> {
        set_nonblocking(&file)?;

        let name = match read_name(&file) {
            Ok(name) => name,
            Err(e) => {
                debug!("could not read the name of {}: {e}", path.display());
                String::from("unknown")
            }
        };

        match read_event_flags(&file) {
            Ok(flags) if flags & (1 << EV_KEY) == 0 => {
                warn!("{} does not report key events", path.display());
            }
            Ok(_) => {}
            Err(e) => debug!("could not read the event types of {}: {e}", path.display()),
        }

        info!("opened input device {name:?} at {}", path.display());

        Ok(Self {
            name,
            path,
            async_fd: AsyncFd::new(file)?,
            pending: VecDeque::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Stream for InputDevice {
    type Item = TrackerResult<RawKeyEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(ev) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(ev)));
            }

            let read = {
                let mut guard = ready!(this.async_fd.poll_read_ready(cx))?;

                match guard.try_io(|inner| read_input_events(inner.as_raw_fd())) {
                    Ok(result) => result,
                    Err(_would_block) => continue,
                }
            };

            match read {
                Ok(events) if events.is_empty() => {
                    info!("{} reached end of file", this.path.display());
                    return Poll::Ready(None);
                }
                Ok(events) => this.pending.extend(events.iter().map(RawKeyEvent::from)),
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            }
        }
    }
}

/// Read a batch of [`libc::input_event`s](libc::input_event) from the specified file descriptor.
///
/// An empty batch means end of file.
fn read_input_events(fd: RawFd) -> io::Result<Vec<libc::input_event>> {
    const MAX_INPUT_EV: usize = 64;

    let mut input_events = [mem::MaybeUninit::<libc::input_event>::uninit(); MAX_INPUT_EV];

    let n = unsafe {
        libc::read(
            fd,
            input_events.as_mut_ptr() as *mut libc::c_void,
            MAX_INPUT_EV * mem::size_of::<libc::input_event>(),
        )
    };

    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    // evdev only ever hands out whole records.
    let n = (n as usize) / mem::size_of::<libc::input_event>();

    // The first n elements of the array are initialized:
    Ok(input_events[..n]
        .iter()
        .map(|e| unsafe { e.assume_init() })
        .collect())
}

/// Set the `O_NONBLOCK` flag for the specified file.
fn set_nonblocking(f: &File) -> TrackerResult<()> {
    let flags = unsafe { libc::fcntl(f.as_raw_fd(), libc::F_GETFL) };

    if flags < 0 {
        return Err(io::Error::last_os_error().into());
    }

    let res = unsafe { libc::fcntl(f.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) };

    if res < 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(())
}

/// Read the name of the specified device using the `EVIOCGNAME` ioctl.
fn read_name(f: &File) -> TrackerResult<String> {
    const DEVICE_NAME_MAX_LEN: usize = 256;

    let mut device_name = [0u8; DEVICE_NAME_MAX_LEN];

    let eviocgname = (IOC_READ << IOC_DIRSHIFT)
        | (('E' as libc::c_ulong) << IOC_TYPESHIFT)
        | (0x06 << IOC_NRSHIFT)
        | ((device_name.len() as libc::c_ulong) << IOC_SIZESHIFT);

    ioctl(
        f.as_raw_fd(),
        eviocgname,
        device_name.as_mut_ptr() as *mut libc::c_ulong,
    )?;

    let len = device_name
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(device_name.len());

    Ok(String::from_utf8_lossy(&device_name[..len]).into())
}

/// Read the event types supported by the specified device using the `EVIOCGBIT` ioctl.
fn read_event_flags(f: &File) -> TrackerResult<libc::c_ulong> {
    let mut ev_flags: libc::c_ulong = 0;

    let eviocgbit = (IOC_READ << IOC_DIRSHIFT)
        | (('E' as libc::c_ulong) << IOC_TYPESHIFT)
        | (0x20 << IOC_NRSHIFT)
        | ((mem::size_of::<libc::c_ulong>() as libc::c_ulong) << IOC_SIZESHIFT);

    ioctl(
        f.as_raw_fd(),
        eviocgbit,
        (&mut ev_flags) as *mut libc::c_ulong,
    )?;

    Ok(ev_flags)
}

fn ioctl(fd: RawFd, request: libc::c_ulong, buf: *mut libc::c_ulong) -> TrackerResult<()> {
    let res = unsafe { libc::ioctl(fd, request as _, buf) };

    if res < 0 {
        Err(io::Error::last_os_error().into())
    } else {
        Ok(())
    }
}
