//! A REST and WebSocket server demonstrating typed routes, body decoding and
//! sub-protocol negotiation.
//!
//! Try it with:
//!
//! ```text
//! curl http://127.0.0.1:8081/users/42
//! curl -X PUT --data-binary @file.bin http://127.0.0.1:8081/blobs/demo
//! curl -F var1=val1 -F var1=a -F var2=b http://127.0.0.1:8081/upload
//! curl -d 'a=1&b=2' http://127.0.0.1:8081/form
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use breakwater::{
    HttpRequest, HttpResponse, HttpServer, PathValue, PathVariables, ServerConfig, StatusCode, WebSocketHandler,
    WebSocketSession,
};
use log::info;

/// Echoes every text frame back to the sender.
struct Echo {
    room: String,
    session: Option<WebSocketSession>,
}

impl WebSocketHandler for Echo {
    fn on_open(&mut self, session: WebSocketSession) {
        info!("Client joined room {}", self.room);
        self.session = Some(session);
    }

    fn on_text(&mut self, text: &str) {
        if let Some(session) = &self.session {
            let _ = session.send_text(format!("[{}] {text}", self.room));
        }
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        info!("Client left room {} ({code:?} {reason})", self.room);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig {
        addr: "127.0.0.1:8081".parse()?,
        ..ServerConfig::default()
    };
    let server = HttpServer::new(config);

    server.register_path_variable_type("int", |raw: &str| raw.parse::<u64>().ok().map(PathValue::new))?;

    server.add_get("/users/{int}", |req| async move {
        let id = req.variables.get::<u64>(0).copied().unwrap_or_default();
        HttpResponse::new(StatusCode::Ok).with_json(&HashMap::from([("id", id)]))
    })?;

    // A tiny in-memory blob store.
    let blobs: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::default();

    let store = Arc::clone(&blobs);
    server.add_put("/blobs/{string}", move |req| {
        let store = Arc::clone(&store);
        async move {
            let name = req.variables.str(0).unwrap_or_default().to_string();
            let data = req.body.as_raw().unwrap_or_default().to_vec();
            let size = data.len();
            if let Ok(mut blobs) = store.lock() {
                blobs.insert(name.clone(), data);
            }
            Ok(HttpResponse::text(StatusCode::Created, format!("stored {size} bytes as {name}")))
        }
    })?;

    let store = Arc::clone(&blobs);
    server.add_get("/blobs/{string}", move |req| {
        let store = Arc::clone(&store);
        async move {
            let name = req.variables.str(0).unwrap_or_default();
            let found = store.lock().ok().and_then(|blobs| blobs.get(name).cloned());
            Ok(match found {
                Some(data) => HttpResponse::new(StatusCode::Ok)
                    .with_content_type("application/octet-stream")
                    .with_body_bytes(data),
                None => HttpResponse::text(StatusCode::NotFound, format!("no blob named {name}")),
            })
        }
    })?;

    let store = Arc::clone(&blobs);
    server.add_delete("/blobs/{string}", move |req| {
        let store = Arc::clone(&store);
        async move {
            let name = req.variables.str(0).unwrap_or_default();
            let removed = store.lock().ok().and_then(|mut blobs| blobs.remove(name)).is_some();
            Ok(HttpResponse::new(if removed { StatusCode::NoContent } else { StatusCode::NotFound }))
        }
    })?;

    server.add_post_multipart("/upload", |req| async move {
        let parts = req.body.as_multipart().map(|parts| parts.keys().join(", ")).unwrap_or_default();
        Ok(HttpResponse::text(StatusCode::Ok, format!("received parts: {parts}")))
    })?;

    server.add_post_form("/form", |req| async move {
        let pairs: HashMap<String, String> = req
            .body
            .as_form()
            .map(|form| form.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
            .unwrap_or_default();
        HttpResponse::new(StatusCode::Ok).with_json(&pairs)
    })?;

    server.add_websocket_route("/rooms/{string}", "echo", |_req: &HttpRequest, vars: PathVariables| {
        let room = vars.str(0)?.to_string();
        let handler: Box<dyn WebSocketHandler> = Box::new(Echo { room, session: None });
        Some(handler)
    })?;

    server.start().await?;

    Ok(())
}
