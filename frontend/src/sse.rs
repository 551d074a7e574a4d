use futures_util::Stream;
use futures_util::stream;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{ReadableStream, ReadableStreamDefaultReader};

use agentic_console::errors::AppError;
use agentic_console::models::ChatRequest;
use agentic_console::session::Session;

use crate::api;

/// Body chunks of a `fetch` response, read through its stream reader.
fn body_chunks(body: ReadableStream) -> impl Stream<Item = Result<Vec<u8>, AppError>> {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();

    stream::unfold(Some(reader), |reader| async move {
        let reader = reader?;
        match JsFuture::from(reader.read()).await {
            Ok(result) => {
                let done = Reflect::get(&result, &JsValue::from_str("done"))
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                if done {
                    return None;
                }
                let value = Reflect::get(&result, &JsValue::from_str("value"))
                    .unwrap_or(JsValue::UNDEFINED);
                let bytes = value
                    .dyn_into::<Uint8Array>()
                    .map(|chunk| chunk.to_vec())
                    .unwrap_or_default();
                Some((Ok(bytes), Some(reader)))
            }
            Err(e) => Some((Err(AppError::transport(format!("Stream read failed: {e:?}"))), None)),
        }
    })
}

/// Posts `request` to the streaming endpoint and resolves to its body once
/// the response headers arrived with a success status.
pub async fn open(
    request: ChatRequest,
    session: Session,
) -> Result<impl Stream<Item = Result<Vec<u8>, AppError>>, AppError> {
    let resp = api::open_chat_stream(&request, &session).await?;
    let body = resp
        .body()
        .ok_or_else(|| AppError::transport("Streaming response has no body"))?;
    Ok(body_chunks(body))
}
