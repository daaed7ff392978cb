use std::sync::Arc;

use gpui::*;
use gpui_component::Root;

use docent::app::{AppShell, Quit};
use docent::settings::BackendSettings;
use docent_api::{BackendConfig, HttpBackend, QaBackend};

/// Application entry point.
///
/// Bootstraps the GPUI application: assets, the Tokio bridge for network
/// work, gpui-component initialization, settings loading, backend
/// construction, and the main window.
fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Required before any Root usage: theme system and component registry.
        gpui_component::init(cx);

        let settings = BackendSettings::load();
        tracing::info!(base_url = %settings.base_url, "connecting to QA backend");

        let backend: Arc<dyn QaBackend> =
            Arc::new(HttpBackend::new(BackendConfig::new(settings.base_url)));

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });
        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        let options = WindowOptions {
            window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                None,
                size(px(980.), px(720.)),
                cx,
            ))),
            titlebar: Some(TitlebarOptions {
                appears_transparent: true,
                traffic_light_position: Some(point(px(9.), px(9.))),
                ..Default::default()
            }),
            // Draw client decorations on Linux/FreeBSD so the app owns its title area.
            #[cfg(any(target_os = "linux", target_os = "freebsd"))]
            window_decorations: Some(WindowDecorations::Client),
            #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
            window_decorations: None,
            ..Default::default()
        };

        cx.open_window(options, |window, cx| {
            let shell = cx.new(|cx| AppShell::new(backend.clone(), window, cx));
            cx.new(|cx| Root::new(shell, window, cx))
        })
        .expect("failed to open main window");

        cx.activate(true);
    });
}
