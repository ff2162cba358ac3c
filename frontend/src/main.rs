mod api;

use gloo_file::{File as GlooFile, ObjectUrl};
use shared::{
    Disease, DiseaseDescriptor, DiseaseKind, FeatureValue, PredictionRequest, PredictionResponse,
};
use std::collections::HashMap;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

// Yew msg components
enum Msg {
    // Startup
    DescriptorsLoaded(Vec<DiseaseDescriptor>),

    // Page state
    SelectDisease(usize),
    FieldChanged(String, String),
    FileSelected(GlooFile),
    ClearFile,

    // Prediction flow
    Submit,
    Prediction(PredictionResponse),

    // UI states
    SetError(Option<String>),
    ToggleTheme,
}

// Main component
struct Model {
    descriptors: Vec<DiseaseDescriptor>,
    selected: usize,
    form: HashMap<String, String>,
    file: Option<GlooFile>,
    preview_url: Option<ObjectUrl>,
    result: Option<PredictionResponse>,
    loading: bool,
    error: Option<String>,
    theme: String,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let link = ctx.link().clone();
        spawn_local(async move {
            match api::fetch_diseases().await {
                Ok(descriptors) => link.send_message(Msg::DescriptorsLoaded(descriptors)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
        });

        Self {
            descriptors: Vec::new(),
            selected: 0,
            form: HashMap::new(),
            file: None,
            preview_url: None,
            result: None,
            loading: false,
            error: None,
            theme: "light".to_string(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::DescriptorsLoaded(descriptors) => {
                self.descriptors = descriptors;
                self.selected = 0;
                self.prefill_categoricals();
                true
            }
            Msg::SelectDisease(index) => self.handle_select_disease(index),
            Msg::FieldChanged(name, value) => {
                self.form.insert(name, value);
                false
            }
            Msg::FileSelected(file) => {
                self.preview_url = Some(ObjectUrl::from(file.clone()));
                self.file = Some(file);
                self.result = None;
                self.error = None;
                true
            }
            Msg::ClearFile => {
                self.file = None;
                self.preview_url = None;
                self.result = None;
                true
            }
            Msg::Submit => self.handle_submit(ctx),
            Msg::Prediction(response) => {
                self.result = Some(response);
                self.loading = false;
                true
            }
            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
            Msg::ToggleTheme => self.handle_toggle_theme(),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { self.render_header() }
                { self.render_theme_toggle(ctx) }

                <div class="layout">
                    { self.render_sidebar(ctx) }
                    <main class="main-content">
                        { self.render_page(ctx) }
                        { self.render_error_message() }
                        { self.render_result() }
                    </main>
                </div>

                <footer class="app-footer">
                    <p>{"Multiple Disease Prediction | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

// Handler methods
impl Model {
    fn current(&self) -> Option<&DiseaseDescriptor> {
        self.descriptors.get(self.selected)
    }

    /// Select inputs need a concrete initial value; numeric fields start
    /// empty.
    fn prefill_categoricals(&mut self) {
        if let Some(descriptor) = self.descriptors.get(self.selected) {
            for field in &descriptor.fields {
                if let Some(categories) = &field.categories {
                    if let Some(first) = categories.first() {
                        self.form.entry(field.name.clone()).or_insert(first.clone());
                    }
                }
            }
        }
    }

    fn handle_select_disease(&mut self, index: usize) -> bool {
        if index == self.selected || index >= self.descriptors.len() {
            return false;
        }
        self.selected = index;
        self.form.clear();
        self.file = None;
        self.preview_url = None;
        self.result = None;
        self.error = None;
        self.prefill_categoricals();
        true
    }

    fn handle_submit(&mut self, ctx: &Context<Self>) -> bool {
        let Some(descriptor) = self.current().cloned() else {
            return false;
        };
        self.result = None;

        match descriptor.kind {
            DiseaseKind::Tabular => match self.build_request(&descriptor) {
                Ok(request) => {
                    self.loading = true;
                    self.error = None;
                    self.send_tabular_request(ctx, descriptor.disease, request);
                }
                Err(e) => {
                    self.error = Some(e);
                }
            },
            DiseaseKind::Image => match self.file.clone() {
                Some(file) => {
                    self.loading = true;
                    self.error = None;
                    self.send_image_request(ctx, descriptor.disease, file);
                }
                None => {
                    self.error = Some("Select an image to analyze first.".to_string());
                }
            },
        }
        true
    }

    fn build_request(&self, descriptor: &DiseaseDescriptor) -> Result<PredictionRequest, String> {
        let mut features = HashMap::new();
        for field in &descriptor.fields {
            let raw = self
                .form
                .get(&field.name)
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            if raw.is_empty() {
                return Err(format!("Field '{}' is required.", field.name));
            }
            let value = if field.categories.is_some() {
                FeatureValue::Text(raw)
            } else {
                let number = raw
                    .parse::<f64>()
                    .map_err(|_| format!("Field '{}' must be numeric.", field.name))?;
                FeatureValue::Number(number)
            };
            features.insert(field.name.clone(), value);
        }
        Ok(PredictionRequest { features })
    }

    fn send_tabular_request(
        &self,
        ctx: &Context<Self>,
        disease: Disease,
        request: PredictionRequest,
    ) {
        let link = ctx.link().clone();
        spawn_local(async move {
            match api::predict_tabular(disease, &request).await {
                Ok(response) => link.send_message(Msg::Prediction(response)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
        });
    }

    fn send_image_request(&self, ctx: &Context<Self>, disease: Disease, file: GlooFile) {
        let link = ctx.link().clone();
        spawn_local(async move {
            match api::predict_image(disease, &file).await {
                Ok(response) => link.send_message(Msg::Prediction(response)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
        });
    }

    fn handle_toggle_theme(&mut self) -> bool {
        let body = web_sys::window().unwrap().document().unwrap().body().unwrap();

        if self.theme == "light" {
            self.theme = "dark".to_string();
            body.class_list().add_1("dark-mode").unwrap();
        } else {
            self.theme = "light".to_string();
            body.class_list().remove_1("dark-mode").unwrap();
        }

        true
    }
}

// Rendering methods
impl Model {
    fn render_header(&self) -> Html {
        html! {
            <header class="app-header">
                <h1><i class="fa-solid fa-stethoscope"></i> {" Multiple Disease Prediction"}</h1>
                <p class="subtitle">{"Clinical record and scan based screening"}</p>
            </header>
        }
    }

    fn render_theme_toggle(&self, ctx: &Context<Self>) -> Html {
        let link = ctx.link();

        html! {
            <div class="top-right">
                <button
                    id="theme-toggle"
                    class="theme-toggle"
                    onclick={link.callback(|_| Msg::ToggleTheme)}
                    title={ if self.theme == "light" { "Switch to Dark Mode" } else { "Switch to Light Mode" } }
                >
                    { if self.theme == "light" { "☀" } else { "☾" } }
                </button>
            </div>
        }
    }

    fn render_sidebar(&self, ctx: &Context<Self>) -> Html {
        let link = ctx.link();
        html! {
            <nav class="sidebar">
                <h2>{"Diseases"}</h2>
                <ul>
                    { for self.descriptors.iter().enumerate().map(|(i, descriptor)| {
                        let is_selected = i == self.selected;
                        html! {
                            <li
                                class={classes!("sidebar-item", is_selected.then_some("selected"))}
                                onclick={link.callback(move |_| Msg::SelectDisease(i))}
                            >
                                { &descriptor.display_name }
                            </li>
                        }
                    })}
                </ul>
            </nav>
        }
    }

    fn render_page(&self, ctx: &Context<Self>) -> Html {
        let Some(descriptor) = self.current() else {
            return html! { <p class="no-results-message">{"No trained models available."}</p> };
        };

        let form = match descriptor.kind {
            DiseaseKind::Tabular => self.render_form(ctx, descriptor),
            DiseaseKind::Image => self.render_upload_section(ctx),
        };

        html! {
            <div class="disease-page">
                <h2>{ &descriptor.display_name }</h2>
                { form }
                { self.render_submit_button(ctx) }
            </div>
        }
    }

    fn render_form(&self, ctx: &Context<Self>, descriptor: &DiseaseDescriptor) -> Html {
        html! {
            <div class="form-grid">
                { for descriptor.fields.iter().map(|field| {
                    match &field.categories {
                        Some(categories) => self.render_select_field(ctx, &field.name, categories),
                        None => self.render_numeric_field(ctx, &field.name),
                    }
                })}
            </div>
        }
    }

    fn render_numeric_field(&self, ctx: &Context<Self>, name: &str) -> Html {
        let link = ctx.link();
        let field_name = name.to_string();
        let value = self.form.get(name).cloned().unwrap_or_default();
        let oninput = link.callback(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            Msg::FieldChanged(field_name.clone(), input.value())
        });

        html! {
            <div class="form-field">
                <label for={name.to_string()}>{ name }</label>
                <input
                    type="number"
                    step="any"
                    id={name.to_string()}
                    value={value}
                    {oninput}
                />
            </div>
        }
    }

    fn render_select_field(&self, ctx: &Context<Self>, name: &str, categories: &[String]) -> Html {
        let link = ctx.link();
        let field_name = name.to_string();
        let selected = self.form.get(name).cloned().unwrap_or_default();
        let onchange = link.callback(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            Msg::FieldChanged(field_name.clone(), select.value())
        });

        html! {
            <div class="form-field">
                <label for={name.to_string()}>{ name }</label>
                <select id={name.to_string()} {onchange}>
                    { for categories.iter().map(|category| {
                        html! {
                            <option value={category.clone()} selected={*category == selected}>
                                { category }
                            </option>
                        }
                    })}
                </select>
            </div>
        }
    }

    fn render_upload_section(&self, ctx: &Context<Self>) -> Html {
        let link = ctx.link();
        let handle_change = link.batch_callback(|e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let file = input
                .files()
                .and_then(|files| files.item(0))
                .filter(|file| file.type_().starts_with("image/"))
                .map(GlooFile::from);
            input.set_value("");
            match file {
                Some(file) => Some(Msg::FileSelected(file)),
                None => Some(Msg::SetError(Some("No valid image file selected.".into()))),
            }
        });

        html! {
            <div class="upload-section">
                <input
                    type="file"
                    id="file-input"
                    accept="image/*"
                    onchange={handle_change}
                />
                { self.render_preview() }
            </div>
        }
    }

    fn render_preview(&self) -> Html {
        match (&self.file, &self.preview_url) {
            (Some(file), Some(url)) => html! {
                <div class="preview-item">
                    <img
                        src={url.to_string()}
                        alt={file.name()}
                        style="max-width: 100%; max-height: 300px; object-fit: contain;"
                    />
                    <p>{ file.name() }</p>
                </div>
            },
            _ => html! {
                <div class="upload-placeholder">
                    <p>{"Upload a scan image to analyze"}</p>
                </div>
            },
        }
    }

    fn render_submit_button(&self, ctx: &Context<Self>) -> Html {
        let link = ctx.link();
        html! {
            <button
                class="analyze-btn"
                onclick={link.callback(|_| Msg::Submit)}
                disabled={self.loading}
            >
                { if self.loading {
                    html! { <>{"Predicting..."}</> }
                } else {
                    html! { <>{"Predict"}</> }
                }}
            </button>
        }
    }

    fn render_error_message(&self) -> Html {
        if let Some(error_msg) = &self.error {
            html! {
                <div class="error-message">
                    <p>{ error_msg }</p>
                </div>
            }
        } else {
            html! {}
        }
    }

    fn render_result(&self) -> Html {
        let Some(result) = &self.result else {
            return html! {};
        };
        let percentage = result.probability * 100.0;

        html! {
            <div class={classes!("results-container", if result.positive { "positive" } else { "negative" })}>
                <div class="result-header">
                    <h2>{ format!("{}: {}", result.disease.display_name(), result.label) }</h2>
                    <div class="confidence-meter">
                        <div class="meter-label">{"Probability:"}</div>
                        <div class="meter">
                            <div class="meter-fill" style={format!("width: {}%", percentage)}></div>
                        </div>
                        <div class="meter-value">{ format!("{:.1}%", percentage) }</div>
                    </div>
                </div>
            </div>
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
