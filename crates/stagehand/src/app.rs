use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("stagehand")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compositor and application lifecycle daemon for embedded shells")
        .long_about("Stagehand launches the shell applications of an embedded device, decides which one is in front, animates them in and out, and serves a control socket that applications use to start each other, post notifications and toggle the home screen or the switcher.")
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("socket")
                .long("socket")
                .help("Control socket path (overrides config)")
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run the compositor daemon in the foreground")
                .arg(
                    Arg::new("apps")
                        .long("apps")
                        .help("Directory of application definition files (overrides config)"),
                )
                .arg(
                    Arg::new("switcher")
                        .long("switcher")
                        .help("Task switcher layout")
                        .value_parser(["horizontal", "carousel"])
                        .default_value("horizontal"),
                ),
        )
        .subcommand(
            Command::new("start")
                .about("Start an application, or bring its running instance to front")
                .arg(
                    Arg::new("name")
                        .help("Application name as registered by its definition file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("home")
                .about("Show or hide the home screen")
                .arg(
                    Arg::new("action")
                        .required(true)
                        .index(1)
                        .value_parser(["show", "hide"]),
                ),
        )
        .subcommand(
            Command::new("switcher")
                .about("Show or hide the task switcher")
                .arg(
                    Arg::new("action")
                        .required(true)
                        .index(1)
                        .value_parser(["show", "hide"]),
                ),
        )
        .subcommand(
            Command::new("apps")
                .about("List launchable applications")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("fps").about("Print the compositor frame rate"))
        .subcommand(Command::new("back").about("Send a back key to the foreground application"))
        .subcommand(
            Command::new("notify")
                .about("Post a notification on behalf of this process")
                .arg(
                    Arg::new("title")
                        .long("title")
                        .short('t')
                        .help("Notification title"),
                )
                .arg(
                    Arg::new("body")
                        .long("body")
                        .short('b')
                        .help("Notification body"),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .help("Replace a pending or visible notification with the same tag"),
                )
                .arg(Arg::new("icon").long("icon").help("Icon path"))
                .arg(
                    Arg::new("wait")
                        .long("wait")
                        .help("Wait for the notification to be clicked or dismissed")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("options")
                .about("Apply a JSON options document to the running compositor")
                .arg(
                    Arg::new("file")
                        .help("Path to the options document, or '-' for stdin")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("shutdown").about("Ask the running daemon to exit"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_build() {
        let app = build_cli();
        assert_eq!(app.get_name(), "stagehand");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let app = build_cli();
        let matches = app.try_get_matches_from(vec!["stagehand"]);
        assert!(matches.is_err());
    }

    #[test]
    fn test_cli_run_defaults() {
        let app = build_cli();
        let matches = app.try_get_matches_from(vec!["stagehand", "run"]).unwrap();
        let run_matches = matches.subcommand_matches("run").unwrap();
        assert_eq!(
            run_matches.get_one::<String>("switcher").unwrap(),
            "horizontal"
        );
        assert!(run_matches.get_one::<String>("apps").is_none());
    }

    #[test]
    fn test_cli_run_overrides() {
        let app = build_cli();
        let matches = app
            .try_get_matches_from(vec![
                "stagehand",
                "run",
                "--apps",
                "/opt/apps",
                "--socket",
                "/tmp/stage.sock",
                "--switcher",
                "carousel",
            ])
            .unwrap();
        let run_matches = matches.subcommand_matches("run").unwrap();
        assert_eq!(run_matches.get_one::<String>("apps").unwrap(), "/opt/apps");
        assert_eq!(
            run_matches.get_one::<String>("socket").unwrap(),
            "/tmp/stage.sock"
        );
        assert_eq!(
            run_matches.get_one::<String>("switcher").unwrap(),
            "carousel"
        );
    }

    #[test]
    fn test_cli_run_rejects_unknown_switcher() {
        let app = build_cli();
        let matches = app.try_get_matches_from(vec!["stagehand", "run", "--switcher", "grid"]);
        assert!(matches.is_err());
    }

    #[test]
    fn test_cli_quiet_is_global() {
        let app = build_cli();
        let matches = app
            .try_get_matches_from(vec!["stagehand", "fps", "-q"])
            .unwrap();
        assert!(matches.get_flag("quiet"));
    }

    #[test]
    fn test_cli_start_requires_name() {
        let app = build_cli();
        assert!(
            app.clone()
                .try_get_matches_from(vec!["stagehand", "start"])
                .is_err()
        );

        let matches = app
            .try_get_matches_from(vec!["stagehand", "start", "Browser"])
            .unwrap();
        let start_matches = matches.subcommand_matches("start").unwrap();
        assert_eq!(start_matches.get_one::<String>("name").unwrap(), "Browser");
    }

    #[test]
    fn test_cli_home_action() {
        let app = build_cli();
        let matches = app
            .clone()
            .try_get_matches_from(vec!["stagehand", "home", "show"])
            .unwrap();
        let home_matches = matches.subcommand_matches("home").unwrap();
        assert_eq!(home_matches.get_one::<String>("action").unwrap(), "show");

        assert!(
            app.try_get_matches_from(vec!["stagehand", "home", "toggle"])
                .is_err()
        );
    }

    #[test]
    fn test_cli_apps_json_flag() {
        let app = build_cli();
        let matches = app
            .try_get_matches_from(vec!["stagehand", "apps", "--json"])
            .unwrap();
        let apps_matches = matches.subcommand_matches("apps").unwrap();
        assert!(apps_matches.get_flag("json"));
    }

    #[test]
    fn test_cli_notify_fields() {
        let app = build_cli();
        let matches = app
            .try_get_matches_from(vec![
                "stagehand",
                "notify",
                "--title",
                "Update",
                "--body",
                "Ready to install",
                "--tag",
                "updater",
                "--wait",
            ])
            .unwrap();
        let notify_matches = matches.subcommand_matches("notify").unwrap();
        assert_eq!(notify_matches.get_one::<String>("title").unwrap(), "Update");
        assert_eq!(
            notify_matches.get_one::<String>("body").unwrap(),
            "Ready to install"
        );
        assert_eq!(notify_matches.get_one::<String>("tag").unwrap(), "updater");
        assert!(notify_matches.get_one::<String>("icon").is_none());
        assert!(notify_matches.get_flag("wait"));
    }

    #[test]
    fn test_cli_options_file() {
        let app = build_cli();
        let matches = app
            .try_get_matches_from(vec!["stagehand", "options", "-"])
            .unwrap();
        let options_matches = matches.subcommand_matches("options").unwrap();
        assert_eq!(options_matches.get_one::<String>("file").unwrap(), "-");
    }
}
