
pub use ws_test::ws_test_page;

// Shared CSS constant
pub const CSS: &str = r#"
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #111827;
        color: #e5e7eb;
        margin: 0;
        padding: 2rem;
    }

    .clock {
        font-family: 'SF Mono', Monaco, 'Cascadia Code', 'Roboto Mono', monospace;
        font-size: 3rem;
        font-weight: 600;
    }

    .date {
        color: #9ca3af;
        margin-top: 0.25rem;
    }

    .controls {
        display: flex;
        gap: 0.5rem;
        margin: 1.5rem 0;
    }

    select, button {
        background: #1f2937;
        color: #e5e7eb;
        border: 1px solid #374151;
        border-radius: 0.25rem;
        padding: 0.375rem 0.75rem;
    }

    #status.open { color: #48bb78; }
    #status.closed { color: #f87171; }

    #log {
        font-family: monospace;
        font-size: 0.75rem;
        color: #9ca3af;
        max-height: 16rem;
        overflow-y: auto;
        white-space: pre-wrap;
    }
"#;
