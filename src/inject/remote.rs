//! Remote-process bootstrap driver (Windows).
//!
//! Classic DLL injection: allocate memory in the target, write the
//! bootstrap stub path, and start a remote thread at `LoadLibraryW`. The
//! remote thread exiting is the readiness signal — the stub's DllMain
//! loads the runtime module before returning.
//!
//! The `LoadLibraryW` address is resolved in *this* process during
//! preload; kernel32 is mapped at the same base in every process of the
//! same bitness, so the address is valid in the target.

use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use windows_sys::Win32::Foundation::{CloseHandle, WAIT_OBJECT_0, HANDLE};
use windows_sys::Win32::System::Diagnostics::Debug::WriteProcessMemory;
use windows_sys::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows_sys::Win32::System::Memory::{
    VirtualAllocEx, VirtualFreeEx, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::Threading::{
    CreateRemoteThread, OpenProcess, WaitForSingleObject, PROCESS_CREATE_THREAD,
    PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};

use super::{
    Architecture, BootstrapTarget, InjectError, InjectionDriver, PreloadTable, PreloadedSymbol,
};

/// Injects the bootstrap stub into another process by id.
pub struct RemoteProcessDriver {
    process: HANDLE,
    architecture: Architecture,
    load_library: usize,
    remote_thread: HANDLE,
}

// HANDLEs are plain kernel object references; the driver is used from one
// thread at a time behind the injector.
unsafe impl Send for RemoteProcessDriver {}

impl RemoteProcessDriver {
    /// Open the target process. `architecture` must match the target's
    /// bitness, which the caller determines (e.g. via `IsWow64Process`).
    pub fn open(pid: u32, architecture: Architecture) -> Result<Self, InjectError> {
        let access = PROCESS_CREATE_THREAD
            | PROCESS_QUERY_INFORMATION
            | PROCESS_VM_OPERATION
            | PROCESS_VM_READ
            | PROCESS_VM_WRITE;
        let process = unsafe { OpenProcess(access, 0, pid) };
        if process.is_null() {
            return Err(InjectError::BootstrapFailed(format!(
                "cannot open process {pid}"
            )));
        }
        Ok(Self {
            process,
            architecture,
            load_library: 0,
            remote_thread: std::ptr::null_mut(),
        })
    }

    fn wide_path(path: &Path) -> Vec<u16> {
        let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        wide.push(0);
        wide
    }
}

impl InjectionDriver for RemoteProcessDriver {
    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn preload(&mut self, _runtime_module: &Path) -> Result<PreloadTable, InjectError> {
        let kernel32: Vec<u16> = "kernel32.dll\0".encode_utf16().collect();
        let module = unsafe { GetModuleHandleW(kernel32.as_ptr()) };
        if module.is_null() {
            return Err(InjectError::PreloadFailed {
                symbol: "LoadLibraryW".into(),
                detail: "kernel32.dll not mapped".into(),
            });
        }
        let address = unsafe { GetProcAddress(module, b"LoadLibraryW\0".as_ptr()) };
        let address = address.ok_or_else(|| InjectError::PreloadFailed {
            symbol: "LoadLibraryW".into(),
            detail: "GetProcAddress returned null".into(),
        })? as usize;

        self.load_library = address;
        Ok(PreloadTable::new(vec![PreloadedSymbol {
            name: "LoadLibraryW".into(),
            address,
        }]))
    }

    fn start_bootstrap(&mut self, target: &BootstrapTarget) -> Result<(), InjectError> {
        if self.load_library == 0 {
            return Err(InjectError::BootstrapFailed(
                "preload step was skipped".into(),
            ));
        }

        let stub_path = Self::wide_path(&target.bootstrap_stub);
        let bytes = stub_path.len() * std::mem::size_of::<u16>();

        unsafe {
            let remote = VirtualAllocEx(
                self.process,
                std::ptr::null(),
                bytes,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            );
            if remote.is_null() {
                return Err(InjectError::BootstrapFailed(
                    "VirtualAllocEx failed in target".into(),
                ));
            }

            let mut written = 0usize;
            let ok = WriteProcessMemory(
                self.process,
                remote,
                stub_path.as_ptr() as *const c_void,
                bytes,
                &mut written,
            );
            if ok == 0 || written != bytes {
                VirtualFreeEx(self.process, remote, 0, MEM_RELEASE);
                return Err(InjectError::BootstrapFailed(
                    "WriteProcessMemory failed in target".into(),
                ));
            }

            let start = std::mem::transmute::<
                usize,
                unsafe extern "system" fn(*mut c_void) -> u32,
            >(self.load_library);
            let thread = CreateRemoteThread(
                self.process,
                std::ptr::null(),
                0,
                Some(start),
                remote,
                0,
                std::ptr::null_mut(),
            );
            if thread.is_null() {
                VirtualFreeEx(self.process, remote, 0, MEM_RELEASE);
                return Err(InjectError::BootstrapFailed(
                    "CreateRemoteThread failed".into(),
                ));
            }
            self.remote_thread = thread;
        }
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), InjectError> {
        if self.remote_thread.is_null() {
            return Err(InjectError::BootstrapFailed(
                "bootstrap thread was never started".into(),
            ));
        }
        let millis = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
        let status = unsafe { WaitForSingleObject(self.remote_thread, millis) };
        if status == WAIT_OBJECT_0 {
            Ok(())
        } else {
            Err(InjectError::InjectionTimeout(timeout))
        }
    }
}

impl Drop for RemoteProcessDriver {
    fn drop(&mut self) {
        unsafe {
            if !self.remote_thread.is_null() {
                CloseHandle(self.remote_thread);
            }
            if !self.process.is_null() {
                CloseHandle(self.process);
            }
        }
    }
}
