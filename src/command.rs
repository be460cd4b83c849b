use std::fmt;

/// A command as it goes to a driver: upper-case verb plus raw byte arguments.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Vec<u8>>,
}

impl Command {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_vec()));
        self
    }

    /// Append an integer argument in its decimal form.
    #[must_use]
    pub fn arg_int(self, value: i64) -> Self {
        self.arg(value.to_string())
    }

    #[must_use]
    pub fn arg_float(self, value: f64) -> Self {
        self.arg(format_float(value))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// Verb plus subcommand for container commands such as `SCRIPT LOAD`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.name.as_str(), self.args.first()) {
            ("SCRIPT" | "CLIENT" | "CONFIG", Some(sub)) => {
                format!(
                    "{} {}",
                    self.name,
                    String::from_utf8_lossy(sub).to_ascii_uppercase()
                )
            }
            _ => self.name.clone(),
        }
    }

    #[cfg(any(feature = "multiplexed", feature = "blocking"))]
    pub(crate) fn to_redis(&self) -> redis::Cmd {
        let mut cmd = redis::cmd(&self.name);
        for arg in &self.args {
            cmd.arg(arg.as_slice());
        }
        cmd
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("args", &args)
            .finish()
    }
}

/// Format a float the way the server prints scores.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 {
            "inf".into()
        } else {
            "-inf".into()
        }
    } else if value.fract() == 0.0 && value.abs() < 1e17 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
