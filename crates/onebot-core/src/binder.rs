//! Typed action binding.
//!
//! A [`Binder`] turns a typed async function into an [`ActionHandler`]. Params
//! arrive as a weakly typed JSON map. HTTP query and form values are always
//! strings, so a string is read as a number or boolean wherever the request
//! type asks for one. Fields typed as text keep the string as is.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde::{Deserialize, Serialize, forward_to_deserialize_any};
use serde_json::Value;

use crate::action::{ActionDispatcher, ActionHandler};
use crate::context::RequestContext;
use crate::envelope::{ActionRawResponse, Params};
use crate::error::{ActionError, ActionResult};

/// Binds params to `Req`, calls the typed function and encodes `Resp`.
pub struct Binder<Req, Resp, F> {
    action: String,
    f: F,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F> Binder<Req, Resp, F> {
    pub fn new(action: impl Into<String>, f: F) -> Self {
        Self {
            action: action.into(),
            f,
            _types: PhantomData,
        }
    }

    /// The action name this binder was created for.
    pub fn action(&self) -> &str {
        &self.action
    }
}

#[async_trait]
impl<Req, Resp, F, Fut> ActionHandler for Binder<Req, Resp, F>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(RequestContext, Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp, ActionError>> + Send,
{
    async fn call(&self, ctx: &RequestContext, params: Params) -> ActionResult {
        let request = decode_params::<Req>(params)?;
        let response = (self.f)(ctx.clone(), request).await?;
        Ok(Some(ActionRawResponse::from_data(&response)?))
    }
}

impl ActionDispatcher {
    /// Registers a typed function through a [`Binder`].
    pub fn bind<Req, Resp, F, Fut>(&mut self, action: impl Into<String>, f: F) -> &mut Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, ActionError>> + Send + 'static,
    {
        let binder = Binder::new(action, f);
        let action = binder.action().to_string();
        self.register(action, binder)
    }
}

/// Decodes a params map into `T`.
pub fn decode_params<T: DeserializeOwned>(params: Params) -> Result<T, ActionError> {
    <T as Deserialize>::deserialize(Lenient(Value::Object(params)))
        .map_err(|e| ActionError::bad_request(format!("bind params to request failed: {e}")))
}

/// A JSON value that parses strings when a number or boolean is requested.
struct Lenient(Value);

impl Lenient {
    fn integer<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        if let Value::String(s) = &self.0 {
            if let Ok(n) = s.parse::<i64>() {
                return visitor.visit_i64(n);
            }
            if let Ok(n) = s.parse::<u64>() {
                return visitor.visit_u64(n);
            }
        }
        self.deserialize_any(visitor)
    }

    fn float<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, serde_json::Error> {
        if let Value::String(s) = &self.0
            && let Ok(n) = s.parse::<f64>()
        {
            return visitor.visit_f64(n);
        }
        self.deserialize_any(visitor)
    }
}

impl<'de> IntoDeserializer<'de, serde_json::Error> for Lenient {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for Lenient {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => {
                let mut seq = SeqDeserializer::<_, serde_json::Error>::new(
                    items.into_iter().map(Lenient),
                );
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            Value::Object(map) => {
                let mut entries = MapDeserializer::<_, serde_json::Error>::new(
                    map.into_iter().map(|(k, v)| (k, Lenient(v))),
                );
                let value = visitor.visit_map(&mut entries)?;
                entries.end()?;
                Ok(value)
            }
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0.as_str() {
            Some("true") => return visitor.visit_bool(true),
            Some("false") => return visitor.visit_bool(false),
            _ => {}
        }
        self.deserialize_any(visitor)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.integer(visitor)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.float(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.float(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_enum(name, variants, visitor)
    }

    forward_to_deserialize_any! {
        char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}
