//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::error::{Error, Fault};
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The collected results of a finished child process.
#[derive(Debug, PartialEq)]
pub struct Finished {
    code: i32,
    stdout: String,
    stderr: String,
}

impl Finished {
    pub fn get_code(&self) -> i32 {
        self.code
    }

    pub fn get_stdout(&self) -> &str {
        &self.stdout
    }

    pub fn get_stderr(&self) -> &str {
        &self.stderr
    }
}

/// Renders the command line of `cmd` for messages.
pub fn describe(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().to_string();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Runs `cmd` to completion, killing it if it outlives `timeout`.
///
/// Output streams are spooled into temporary files so a chatty child can never
/// block on a full pipe while it is being polled.
pub fn execute(cmd: &mut Command, timeout: Option<Duration>) -> Result<Finished, Fault> {
    let mut out = tempfile::tempfile()?;
    let mut err = tempfile::tempfile()?;
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(out.try_clone()?))
        .stderr(Stdio::from(err.try_clone()?))
        .spawn()?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                // the child may have exited in between; ignore a failed kill
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::ProcessTimeout(describe(cmd), limit.as_secs()))?;
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let code = match status.code() {
        Some(c) => c,
        None => return Err(Error::ChildProcTerminated(describe(cmd)))?,
    };
    Ok(Finished {
        code: code,
        stdout: read_spool(&mut out)?,
        stderr: read_spool(&mut err)?,
    })
}

/// Runs `cmd` and requires it to exit with a zero status.
pub fn execute_ok(cmd: &mut Command, timeout: Option<Duration>) -> Result<Finished, Fault> {
    let finished = execute(cmd, timeout)?;
    match finished.code {
        0 => Ok(finished),
        c => Err(Error::ChildProcErrorCode(describe(cmd), c))?,
    }
}

fn read_spool(file: &mut std::fs::File) -> Result<String, Fault> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn captures_output_and_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; echo oops 1>&2; exit 3"]);
        let done = execute(&mut cmd, None).unwrap();
        assert_eq!(done.get_code(), 3);
        assert_eq!(done.get_stdout(), "hello\n");
        assert_eq!(done.get_stderr(), "oops\n");
    }

    #[test]
    fn nonzero_exit_is_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 2"]);
        let err = execute_ok(&mut cmd, None).unwrap_err();
        assert_eq!(err.to_string(), "command \"sh -c exit 2\" exited with error code: 2");
    }

    #[test]
    fn times_out() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err = execute(&mut cmd, Some(Duration::from_millis(100))).unwrap_err();
        assert_eq!(err.to_string().contains("timed out"), true);
    }
}
