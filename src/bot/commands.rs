/// Comando de prefijo reconocido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Búsqueda o URL, posiblemente vacía; el handler informa el uso
    Play(String),
    Stop,
    Pause,
    Loop,
    Skip,
    Diag,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play(_) => "play",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Loop => "loop",
            Self::Skip => "skip",
            Self::Diag => "diag",
        }
    }
}

/// Parsea `content` como `<prefijo><nombre> <args...>`.
///
/// El prefijo distingue mayúsculas, el nombre del comando no. Los argumentos
/// se vuelven a unir con un espacio. Devuelve `None` si no es un comando
/// conocido.
pub fn parse_command(content: &str, prefix: &str) -> Option<Command> {
    let rest = content.strip_prefix(prefix)?;

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let args = parts.collect::<Vec<_>>().join(" ");

    match name.as_str() {
        "p" | "play" => Some(Command::Play(args)),
        "s" | "stop" => Some(Command::Stop),
        "pause" => Some(Command::Pause),
        "loop" => Some(Command::Loop),
        "skip" => Some(Command::Skip),
        "diag" => Some(Command::Diag),
        _ => None,
    }
}
