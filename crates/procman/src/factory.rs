use procman_core::ProcessManagerFactory;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = procman_unix::UnixProcessManager;

    #[cfg(windows)]
    type Manager = procman_windows::WindowsProcessManager;

    fn create_process_manager() -> Self::Manager {
        #[cfg(unix)]
        return procman_unix::UnixProcessManagerFactory::create_process_manager();

        #[cfg(windows)]
        return procman_windows::WindowsProcessManagerFactory::create_process_manager();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return procman_unix::UnixProcessManagerFactory::platform_name();

        #[cfg(windows)]
        return procman_windows::WindowsProcessManagerFactory::platform_name();
    }
}

/// Process manager for the platform this crate was compiled for
pub type PlatformProcessManager = <PlatformProcessManagerFactory as ProcessManagerFactory>::Manager;
