//-
// Copyright (c) 2026, Mailidx contributors
//
// This file is part of Mailidx.
//
// Mailidx is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailidx is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mailidx. If not, see <http://www.gnu.org/licenses/>.

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use super::config::LoggingConfig;
use super::error::Error;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}][{t}] {m}{n}";

/// Install the process-wide logger described by `config`.
///
/// If `config.config_file` is set, that file is handed to log4rs as-is and
/// the remaining settings are ignored.
pub fn init(config: &LoggingConfig) -> Result<(), Error> {
    if let Some(ref path) = config.config_file {
        return log4rs::init_file(path, Default::default())
            .map_err(|e| Error::BadConfig(format!("{}: {}", path.display(), e)));
    }

    let log4rs_config = build_config(config)?;
    log4rs::init_config(log4rs_config)
        .map(|_| ())
        .map_err(|e| Error::BadConfig(e.to_string()))
}

fn build_config(config: &LoggingConfig) -> Result<Config, Error> {
    let level = config.level.parse::<LevelFilter>().map_err(|_| {
        Error::BadConfig(format!("unknown log level '{}'", config.level))
    })?;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(ref path) = config.file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)?;
        builder =
            builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder
        .build(root.build(level))
        .map_err(|e| Error::BadConfig(e.to_string()))
}
