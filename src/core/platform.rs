use crate::domain::model::Invocation;
use std::path::Path;

/// 依作業系統決定提權、啟動安裝程式與開啟瀏覽器的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// 用來判斷目前是否具備管理員權限的指令
    pub fn elevation_probe(self) -> Invocation {
        match self {
            Platform::Windows => Invocation::new("net", ["session"]),
            Platform::MacOs | Platform::Linux => Invocation::new("id", ["-u"]),
        }
    }

    pub fn is_elevated(self, probe_stdout: &str) -> bool {
        match self {
            // net session 成功即代表是管理員
            Platform::Windows => true,
            Platform::MacOs | Platform::Linux => probe_stdout.trim() == "0",
        }
    }

    /// 以提權方式重新執行自己，並附上 `--elevated` 避免再次提權；
    /// `forwarded` 為要帶給子行程的全域參數 (root、config、日誌設定)
    pub fn elevated_reinvocation(self, exe: &Path, forwarded: &[String]) -> Invocation {
        let mut args = vec!["install-runtime".to_string(), "--elevated".to_string()];
        args.extend(forwarded.iter().cloned());

        let invocation = match self {
            Platform::Windows => {
                let argument_list = args
                    .iter()
                    .map(|arg| powershell_argument(arg))
                    .collect::<Vec<_>>()
                    .join(",");
                Invocation::new(
                    "powershell",
                    [
                        "-NoProfile".to_string(),
                        "-Command".to_string(),
                        format!(
                            "$p = Start-Process -FilePath {} -ArgumentList {} -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
                            powershell_argument(&exe.display().to_string()),
                            argument_list
                        ),
                    ],
                )
            }
            Platform::MacOs | Platform::Linux => {
                let mut sudo_args = vec![exe.display().to_string()];
                sudo_args.extend(args);
                Invocation::new("sudo", sudo_args)
            }
        };
        // sudo 需要終端機輸入密碼，子行程的輸出也直接給使用者
        invocation.streaming()
    }

    pub fn installer_launch(self, installer: &Path) -> Invocation {
        match self {
            Platform::Windows => Invocation::new(
                "powershell",
                [
                    "-NoProfile".to_string(),
                    "-Command".to_string(),
                    format!("Start-Process -FilePath '{}' -Verb RunAs", installer.display()),
                ],
            ),
            Platform::MacOs => Invocation::new("open", [installer.display().to_string()]),
            Platform::Linux => {
                Invocation::new(&installer.display().to_string(), Vec::<String>::new())
            }
        }
    }

    pub fn open_url(self, url: &str) -> Invocation {
        match self {
            // start 的第一個引號參數是視窗標題
            Platform::Windows => Invocation::new("cmd", ["/C", "start", "", url]),
            Platform::MacOs => Invocation::new("open", [url]),
            Platform::Linux => Invocation::new("xdg-open", [url]),
        }
    }
}

/// PowerShell 單引號字串；含空白的值再包一層雙引號，讓 Start-Process 視為單一參數
fn powershell_argument(arg: &str) -> String {
    let value = if arg.contains(' ') {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    };
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_reinvocation_carries_marker() {
        let inv = Platform::Linux.elevated_reinvocation(Path::new("/usr/local/bin/devstack"), &[]);
        assert_eq!(inv.program, "sudo");
        assert_eq!(
            inv.args,
            vec!["/usr/local/bin/devstack", "install-runtime", "--elevated"]
        );
        assert!(inv.streaming);
    }

    #[test]
    fn test_windows_reinvocation_uses_runas() {
        let forwarded = vec![
            "--root".to_string(),
            "C:\\Users\\me\\My Project".to_string(),
            "--verbose".to_string(),
        ];
        let inv = Platform::Windows
            .elevated_reinvocation(Path::new("C:\\tools\\devstack.exe"), &forwarded);
        assert_eq!(inv.program, "powershell");
        let script = inv.args.last().unwrap();
        assert!(script.contains("-Verb RunAs -Wait -PassThru"));
        assert!(script.contains("exit $p.ExitCode"));
        assert!(script.contains("'install-runtime','--elevated','--root'"));
        assert!(script.contains("'\"C:\\Users\\me\\My Project\"'"));
        assert!(script.ends_with("'--verbose' -Verb RunAs -Wait -PassThru; exit $p.ExitCode"));
    }

    #[test]
    fn test_unix_reinvocation_forwards_global_flags() {
        let forwarded = vec![
            "--root".to_string(),
            "/srv/app".to_string(),
            "--config".to_string(),
            "/srv/app/devstack.toml".to_string(),
            "--log-json".to_string(),
        ];
        let inv = Platform::Linux.elevated_reinvocation(Path::new("/bin/devstack"), &forwarded);
        assert_eq!(
            inv.display(),
            "sudo /bin/devstack install-runtime --elevated --root /srv/app --config /srv/app/devstack.toml --log-json"
        );
    }

    #[test]
    fn test_elevation_probe_interpretation() {
        assert!(Platform::Linux.is_elevated("0\n"));
        assert!(!Platform::Linux.is_elevated("1000\n"));
        assert!(Platform::Windows.is_elevated(""));
    }

    #[test]
    fn test_open_url_per_platform() {
        assert_eq!(
            Platform::Linux.open_url("http://localhost:8000/docs").display(),
            "xdg-open http://localhost:8000/docs"
        );
        assert_eq!(Platform::MacOs.open_url("http://x").program, "open");
        assert_eq!(
            Platform::Windows.open_url("http://x").args,
            vec!["/C", "start", "", "http://x"]
        );
    }
}
