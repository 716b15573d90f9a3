use crate::config::LISTENER_POLL_SECS;
use crate::core::input::{Bindings, HotkeyAction, InputSink, Key, Signals, WindowProbe};
use log::{debug, info};
use std::mem::size_of;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use windows::Win32::Foundation::{CloseHandle, ERROR_SUCCESS, POINT};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Registry::{HKEY_CLASSES_ROOT, RRF_RT_REG_SZ, RegGetValueW};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP,
    KEYEVENTF_SCANCODE, MAPVK_VK_TO_VSC, MapVirtualKeyW, SendInput, VIRTUAL_KEY, VK_CONTROL,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetForegroundWindow, GetSystemMetrics, GetWindowTextW, SM_CXSCREEN, SM_CYSCREEN,
    SetCursorPos,
};
use windows::core::{PCWSTR, PWSTR, w};

const TITLE_BUF_LEN: usize = 512;
const PATH_BUF_LEN: usize = 1024;

/// UTF-16 up to the first NUL.
fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[inline(always)]
fn virtual_key(key: Key) -> u16 {
    match key {
        Key::Char(c) => c.to_ascii_uppercase() as u16,
        Key::Escape => 0x1B,
        Key::F(n) => 0x6F + u16::from(n),
        Key::PageUp => 0x21,
        Key::PageDown => 0x22,
        Key::Space => 0x20,
        Key::Enter => 0x0D,
    }
}

#[inline(always)]
fn is_down(vk: u16) -> bool {
    // High bit: currently held.
    unsafe { GetAsyncKeyState(i32::from(vk)) as u16 & 0x8000 != 0 }
}

/// Games reading DirectInput ignore virtual-key events, so keys are sent as
/// hardware scancodes.
fn send_scancode(key: Key, release: bool) -> Result<(), String> {
    let scan = unsafe { MapVirtualKeyW(u32::from(virtual_key(key)), MAPVK_VK_TO_VSC) } as u16;
    let mut flags: KEYBD_EVENT_FLAGS = KEYEVENTF_SCANCODE;
    if release {
        flags |= KEYEVENTF_KEYUP;
    }
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT { wVk: VIRTUAL_KEY(0), wScan: scan, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    };
    let sent = unsafe { SendInput(&[input], size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(format!("SendInput rejected {} for '{}'", if release { "key up" } else { "key down" }, key))
    }
}

pub struct Win32Input {
    screen: (u32, u32),
}

impl Win32Input {
    pub fn new() -> Result<Self, String> {
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if w <= 0 || h <= 0 {
            return Err("Could not query the primary screen size".to_string());
        }
        info!("Primary screen: {}x{}", w, h);
        Ok(Self { screen: (w as u32, h as u32) })
    }
}

impl InputSink for Win32Input {
    fn move_pointer_to(&mut self, x: i32, y: i32) -> Result<(), String> {
        unsafe { SetCursorPos(x, y) }.map_err(|e| format!("SetCursorPos({}, {}) failed: {}", x, y, e))
    }

    fn key_down(&mut self, key: Key) -> Result<(), String> {
        send_scancode(key, false)
    }

    fn key_up(&mut self, key: Key) -> Result<(), String> {
        send_scancode(key, true)
    }

    fn pointer_position(&self) -> Result<(i32, i32), String> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }.map_err(|e| format!("GetCursorPos failed: {}", e))?;
        Ok((point.x, point.y))
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }
}

pub struct ForegroundWindow;

impl WindowProbe for ForegroundWindow {
    fn foreground_title(&self) -> String {
        let mut buf = [0u16; TITLE_BUF_LEN];
        let len = unsafe {
            let hwnd = GetForegroundWindow();
            GetWindowTextW(hwnd, &mut buf)
        };
        if len <= 0 {
            return String::new();
        }
        String::from_utf16_lossy(&buf[..len as usize])
    }
}

// --- osu! install discovery ---

fn process_image_path(pid: u32) -> Option<PathBuf> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
    let mut buf = [0u16; PATH_BUF_LEN];
    let mut len = buf.len() as u32;
    let queried =
        unsafe { QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut len) };
    let _ = unsafe { CloseHandle(handle) };
    queried.ok()?;
    Some(PathBuf::from(String::from_utf16_lossy(&buf[..len as usize])))
}

/// Full path of the first running process named `exe_name`.
pub fn running_process_path(exe_name: &str) -> Option<PathBuf> {
    let snapshot = match unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) } {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!("Process snapshot failed: {}", e);
            return None;
        }
    };
    let mut entry = PROCESSENTRY32W { dwSize: size_of::<PROCESSENTRY32W>() as u32, ..Default::default() };
    let mut found = None;
    let mut more = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
    while more {
        if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(exe_name) {
            found = process_image_path(entry.th32ProcessID);
            if found.is_some() {
                break;
            }
        }
        more = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
    }
    let _ = unsafe { CloseHandle(snapshot) };
    found
}

/// Default value of `HKCR\osu!\shell\open\command`, the URL handler's command line.
pub fn osu_open_command() -> Option<String> {
    let mut buf = [0u16; PATH_BUF_LEN];
    let mut size = (buf.len() * size_of::<u16>()) as u32;
    let status = unsafe {
        RegGetValueW(
            HKEY_CLASSES_ROOT,
            w!("osu!\\shell\\open\\command"),
            PCWSTR::null(),
            RRF_RT_REG_SZ,
            None,
            Some(buf.as_mut_ptr().cast()),
            Some(&mut size),
        )
    };
    if status != ERROR_SUCCESS {
        debug!("osu! registry handler not readable ({:?})", status);
        return None;
    }
    let chars = (size as usize / size_of::<u16>()).min(buf.len());
    Some(wide_to_string(&buf[..chars]))
}

/// Polls every binding for press edges until shutdown is requested.
pub fn run_hotkey_listener(
    bindings: Bindings,
    signals: Arc<Signals>,
    mut on_action: impl FnMut(HotkeyAction) + Send + 'static,
) {
    let keys: Vec<(bool, u16, HotkeyAction)> =
        bindings.iter().map(|(hk, action)| (hk.ctrl, virtual_key(hk.key), *action)).collect();
    let mut held = vec![false; keys.len()];
    debug!("Hotkey listener polling {} bindings", keys.len());

    while !signals.shutdown_requested() {
        let ctrl = is_down(VK_CONTROL.0);
        for (i, &(needs_ctrl, vk, action)) in keys.iter().enumerate() {
            let down = is_down(vk) && ctrl == needs_ctrl;
            if down && !held[i] {
                on_action(action);
            }
            held[i] = down;
        }
        thread::sleep(Duration::from_secs_f64(LISTENER_POLL_SECS));
    }
}
