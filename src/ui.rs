use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, DashboardPane, InputMode, Panel, VideoLink, View};
use crate::audio::PlaybackState;
use crate::models::{group_by_phase, ChatRole, ResourceKind};
use crate::quiz::QuizPhase;

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    render_main(frame, app, chunks[1]);
    render_status(frame, app, chunks[2]);

    if app.modal.is_some() {
        render_node_modal(frame, app);
    }
    if app.chat_open {
        render_chat(frame, app);
    }
    if app.input_mode == InputMode::Topic {
        render_topic_input(frame, app);
    }
    if app.input_mode == InputMode::CodePrompt {
        render_code_prompt(frame, app);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(46)])
        .split(area);

    let tabs: Vec<Span> = View::ALL
        .iter()
        .flat_map(|view| {
            let style = if *view == app.view {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            [Span::styled(view.title(), style), Span::raw("  ")]
        })
        .collect();

    let tabs_widget = Paragraph::new(Line::from(tabs))
        .block(Block::default().borders(Borders::ALL).title(" Study Tutor "));
    frame.render_widget(tabs_widget, chunks[0]);

    let topic = match &app.session {
        Some(session) => session.topic.clone(),
        None => {
            if app.topic_input.is_empty() {
                "<none>".to_string()
            } else {
                format!("{} (not started)", app.topic_input)
            }
        }
    };
    let info = Paragraph::new(format!("{} | {}", topic, app.difficulty.name()))
        .block(Block::default().borders(Borders::ALL).title(" Topic "));
    frame.render_widget(info, chunks[1]);
}

fn render_main(frame: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => render_dashboard(frame, app, area),
        View::Text => render_text(frame, app, area),
        View::Code => render_code(frame, app, area),
        View::Visual => render_visual(frame, app, area),
        View::Audio => render_audio(frame, app, area),
    }
}

fn panel_placeholder(title: &str, body: &str) -> Paragraph<'static> {
    Paragraph::new(body.to_string())
        .style(Style::default().fg(Color::DarkGray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", title)),
        )
        .wrap(Wrap { trim: false })
}

// --- dashboard ---

fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let architecture = match &app.dashboard {
        Panel::Empty => {
            frame.render_widget(
                panel_placeholder("Dashboard", "Press t to set a topic, then s to start."),
                area,
            );
            return;
        }
        Panel::Loading => {
            frame.render_widget(
                panel_placeholder("Dashboard", "Generating learning architecture..."),
                area,
            );
            return;
        }
        Panel::Failed(message) => {
            let error = Paragraph::new(format!("Error: {}", message))
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title(" Dashboard "))
                .wrap(Wrap { trim: false });
            frame.render_widget(error, area);
            return;
        }
        Panel::Ready(architecture) => architecture,
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8)])
        .split(area);

    // Metrics row
    let metrics = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[0]);

    let analytics = &architecture.analytics;
    let cells = [
        ("Time Saved", analytics.time_saved_display()),
        ("Confidence", format!("{}%", analytics.confidence_display())),
        ("Coverage", format!("{}%", analytics.coverage_display())),
        ("Mastery", format!("{}%", app.mastery_score())),
    ];
    for (i, (label, value)) in cells.iter().enumerate() {
        let cell = Paragraph::new(value.clone())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", label)),
            );
        frame.render_widget(cell, metrics[i]);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(body[0]);

    render_knowledge_graph(frame, app, left[0]);
    render_roadmap(frame, app, left[1]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(6)])
        .split(body[1]);

    render_quiz(frame, app, right[0]);
    render_weaknesses(frame, app, right[1]);
}

fn render_knowledge_graph(frame: &mut Frame, app: &App, area: Rect) {
    let Some(architecture) = app.dashboard.ready() else {
        return;
    };

    let items: Vec<ListItem> = architecture
        .knowledge_graph
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let marker = if app.mastery.is_complete(node.id) {
                Span::styled("✓ ", Style::default().fg(Color::Green))
            } else {
                Span::raw("· ")
            };
            let mut style = Style::default();
            if i == app.selected_node && app.dashboard_pane == DashboardPane::Graph {
                style = style.bg(Color::DarkGray);
            }
            ListItem::new(Line::from(vec![
                marker,
                Span::styled(
                    node.skill.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  rigor {}%", node.difficulty),
                    Style::default().fg(Color::Gray),
                ),
            ]))
            .style(style)
        })
        .collect();

    let border_style = if app.dashboard_pane == DashboardPane::Graph {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(" Knowledge Graph "),
    );
    frame.render_widget(list, area);
}

fn render_roadmap(frame: &mut Frame, app: &App, area: Rect) {
    let Some(architecture) = app.dashboard.ready() else {
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for (phase, steps) in group_by_phase(&architecture.roadmap) {
        lines.push(Line::from(Span::styled(
            phase,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )));
        for step in steps {
            lines.push(Line::from(vec![
                Span::raw("  • "),
                Span::styled(
                    format!("{}: ", step.objective),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(step.task.clone()),
                Span::styled(format!(" ({}h)", step.hours), Style::default().fg(Color::Gray)),
            ]));
        }
    }

    let roadmap = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Roadmap "))
        .wrap(Wrap { trim: false });
    frame.render_widget(roadmap, area);
}

fn render_quiz(frame: &mut Frame, app: &App, area: Rect) {
    let border_style = if app.dashboard_pane == DashboardPane::Quiz {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" Quiz (Q{}) ", app.quiz.cursor() + 1));

    let mut lines: Vec<Line> = Vec::new();
    match app.quiz.phase() {
        QuizPhase::Inactive => {
            lines.push(Line::from(Span::styled(
                "Start a session to take the quiz.",
                Style::default().fg(Color::DarkGray),
            )));
        }
        QuizPhase::FetchingMore => {
            lines.push(Line::from(Span::styled(
                "Generating new questions...",
                Style::default().fg(Color::DarkGray),
            )));
        }
        QuizPhase::FetchFailed => {
            lines.push(Line::from(Span::styled(
                format!(
                    "Could not fetch questions: {}",
                    app.quiz.fetch_error().unwrap_or("unknown error")
                ),
                Style::default().fg(Color::Red),
            )));
            lines.push(Line::from("Press r to retry."));
        }
        QuizPhase::AwaitingAnswer | QuizPhase::Answered => {
            if let Some(question) = app.quiz.current() {
                lines.push(Line::from(Span::styled(
                    question.question.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());

                let record = app.quiz.answer();
                for (i, option) in question.options.iter().enumerate() {
                    let mut style = Style::default();
                    let mut prefix = format!("  {}. ", i + 1);
                    if let Some(record) = record {
                        if i == question.answer {
                            style = Style::default().fg(Color::Green);
                            prefix = format!("✔ {}. ", i + 1);
                        } else if i == record.chosen {
                            style = Style::default().fg(Color::Red);
                            prefix = format!("✘ {}. ", i + 1);
                        }
                    }
                    lines.push(Line::from(Span::styled(
                        format!("{}{}", prefix, option),
                        style,
                    )));
                }

                if let Some(record) = record {
                    lines.push(Line::default());
                    let verdict = if record.correct {
                        Span::styled(
                            "Correct! ",
                            Style::default()
                                .fg(Color::Green)
                                .add_modifier(Modifier::BOLD),
                        )
                    } else {
                        Span::styled(
                            "Incorrect. ",
                            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                        )
                    };
                    lines.push(Line::from(vec![
                        verdict,
                        Span::raw(question.explanation.clone()),
                    ]));
                    lines.push(Line::from(Span::styled(
                        "n: next question",
                        Style::default().fg(Color::Gray),
                    )));
                }
            }
        }
    }

    let quiz = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(quiz, area);
}

fn render_weaknesses(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = if app.quiz.weaknesses().is_empty() {
        vec![ListItem::new(Span::styled(
            "No weaknesses detected yet.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.quiz
            .weaknesses()
            .iter()
            .map(|tag| {
                ListItem::new(Line::from(vec![
                    Span::styled("⚠ ", Style::default().fg(Color::Yellow)),
                    Span::raw(tag.clone()),
                ]))
            })
            .collect()
    };

    let list =
        List::new(items).block(Block::default().borders(Borders::ALL).title(" Weaknesses "));
    frame.render_widget(list, area);
}

// --- content panels ---

fn render_text(frame: &mut Frame, app: &App, area: Rect) {
    let widget = match &app.text_panel {
        Panel::Empty => panel_placeholder("Lesson", "No lesson yet. Start a session."),
        Panel::Loading => panel_placeholder("Lesson", "Generating lesson text..."),
        Panel::Failed(message) => Paragraph::new(format!("Error: {}", message))
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title(" Lesson "))
            .wrap(Wrap { trim: false }),
        Panel::Ready(lesson) => Paragraph::new(lesson.raw_text.clone())
            .block(Block::default().borders(Borders::ALL).title(" Lesson "))
            .wrap(Wrap { trim: false }),
    };
    frame.render_widget(widget, area);
}

fn render_code(frame: &mut Frame, app: &App, area: Rect) {
    match &app.code_panel {
        Panel::Empty => {
            frame.render_widget(
                panel_placeholder("Code", "Code will appear here after a session starts."),
                area,
            );
        }
        Panel::Loading => {
            frame.render_widget(panel_placeholder("Code", "Generating code sample..."), area);
        }
        Panel::Failed(message) => {
            let error = Paragraph::new(format!("Error: {}", message))
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title(" Code "))
                .wrap(Wrap { trim: false });
            frame.render_widget(error, area);
        }
        Panel::Ready(sample) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(5), Constraint::Length(3)])
                .split(area);

            let code = Paragraph::new(sample.code.clone())
                .block(Block::default().borders(Borders::ALL).title(" Code "))
                .wrap(Wrap { trim: false });
            frame.render_widget(code, chunks[0]);

            let badge = Paragraph::new(sample.dependency_badge())
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL).title(" Dependencies "));
            frame.render_widget(badge, chunks[1]);
        }
    }
}

fn render_visual(frame: &mut Frame, app: &App, area: Rect) {
    let widget = match &app.visual_panel {
        Panel::Empty => panel_placeholder("Visual", "No diagram yet. Start a session."),
        Panel::Loading => panel_placeholder("Visual", "Generating high-res visual..."),
        Panel::Failed(message) => Paragraph::new(format!("Error generating visual: {}", message))
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title(" Visual "))
            .wrap(Wrap { trim: false }),
        Panel::Ready(diagram) => Paragraph::new(vec![
            Line::from(format!(
                "{} diagram generated ({} KiB)",
                diagram.format,
                diagram.size_bytes / 1024
            )),
            Line::default(),
            Line::from(format!("Saved to {}", diagram.path.display())),
            Line::from(Span::styled(
                "Open it with your image viewer.",
                Style::default().fg(Color::Gray),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title(" Visual "))
        .wrap(Wrap { trim: false }),
    };
    frame.render_widget(widget, area);
}

fn render_audio(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.audio.state();
    let control = match state {
        PlaybackState::Playing => "⏸ pause (Space)",
        PlaybackState::Paused | PlaybackState::Ready | PlaybackState::Ended => "▶ play (Space)",
        PlaybackState::Loading => "…",
        PlaybackState::Idle => "▶ generate & play (Space)",
    };

    let mut lines = vec![
        Line::from(Span::styled(
            state.status_text(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(control),
        Line::from(format!("Voice: {} (v to change)", app.voice.label())),
    ];
    if let Some(path) = app.audio.clip_path() {
        lines.push(Line::default());
        lines.push(Line::from(format!("Clip saved to {}", path.display())));
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Audio Guide "))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

// --- overlays ---

fn render_node_modal(frame: &mut Frame, app: &App) {
    let Some(modal) = &app.modal else {
        return;
    };
    let Some(node) = app
        .dashboard
        .ready()
        .and_then(|arch| arch.knowledge_graph.get(modal.node_index))
    else {
        return;
    };

    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::raw(node.description.clone())),
        Line::default(),
    ];
    for (i, resource) in node.resources.iter().enumerate() {
        let line = match resource.kind {
            ResourceKind::Video => match modal.videos.get(&i) {
                Some(VideoLink::Ready(id)) => Line::from(vec![
                    Span::styled("[Video] ", Style::default().fg(Color::Cyan)),
                    Span::raw(format!(
                        "{} — https://www.youtube.com/watch?v={}",
                        resource.title, id
                    )),
                ]),
                Some(VideoLink::Resolving) => Line::from(vec![
                    Span::styled("[Video] ", Style::default().fg(Color::Cyan)),
                    Span::styled(
                        format!("{} — resolving...", resource.title),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
                _ => Line::from(vec![
                    Span::styled("[Video] ", Style::default().fg(Color::Cyan)),
                    Span::styled("Video unavailable.", Style::default().fg(Color::Red)),
                ]),
            },
            kind => Line::from(vec![
                Span::styled(
                    format!("[{}] ", kind.name()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(format!(
                    "{} — {}",
                    resource.title,
                    resource.url.as_deref().unwrap_or("")
                )),
            ]),
        };
        lines.push(line);
    }
    if node.resources.is_empty() {
        lines.push(Line::from(Span::styled(
            "No resources found.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::default());
    let toggle_hint = if app.mastery.is_complete(node.id) {
        "m: mark incomplete"
    } else {
        "m: mark as complete"
    };
    lines.push(Line::from(Span::styled(
        toggle_hint,
        Style::default().fg(Color::Green),
    )));

    let modal_widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", node.skill)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(modal_widget, area);
}

fn render_chat(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let width = (area.width / 3).max(30).min(area.width);
    let chat_area = Rect {
        x: area.width.saturating_sub(width),
        y: area.y + 3,
        width,
        height: area.height.saturating_sub(4),
    };
    frame.render_widget(Clear, chat_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(chat_area);

    let mut lines: Vec<Line> = app
        .chat_messages
        .iter()
        .map(|message| match message.role {
            ChatRole::User => Line::from(Span::styled(
                format!("[{}] you: {}", message.stamp(), message.text),
                Style::default().fg(Color::Gray),
            )),
            ChatRole::Bot => Line::from(vec![
                Span::styled(
                    format!("[{}] ", message.stamp()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(format!("tutor: {}", message.text)),
            ]),
        })
        .collect();
    if app.chat_waiting {
        lines.push(Line::from(Span::styled(
            "tutor is typing...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    // Keep the tail of the transcript visible.
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Tutor Chat "))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(transcript, chunks[0]);

    let input = Paragraph::new(format!("> {}", app.chat_input))
        .block(Block::default().borders(Borders::ALL).title(" Message "));
    frame.render_widget(input, chunks[1]);
}

fn render_topic_input(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);

    let input = Paragraph::new(app.topic_input.clone())
        .block(Block::default().borders(Borders::ALL).title(" Topic "));
    frame.render_widget(input, area);
}

fn render_code_prompt(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);

    let input = Paragraph::new(app.code_prompt.clone()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Code Prompt (blank = session topic) "),
    );
    frame.render_widget(input, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let paragraph = Paragraph::new(format!(" {} ", app.status_text()))
        .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
