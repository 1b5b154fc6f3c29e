//! Embedded worker dispatch epilogue.
//!
//! Appended after the bundled module code. It reads one `{method, args}` line
//! from stdin, calls the matching entry of an explicit export table, writes one
//! prefixed reply line to stdout and exits: 0 after `{data}`, 1 after `{error}`.

use crate::transform::js_string;
use crate::worker::protocol::REPLY_PREFIX;

const EXPORTS_PLACEHOLDER: &str = "__DIWU_EXPORTS__";
const PREFIX_PLACEHOLDER: &str = "__DIWU_REPLY_PREFIX__";

/// JavaScript template for the epilogue.
pub const EPILOGUE_TEMPLATE: &str = r#"
;(function () {
  const context = {__DIWU_EXPORTS__};
  const prefix = __DIWU_REPLY_PREFIX__;
  let state = 'awaiting';
  let buffer = '';

  function describe(error) {
    return error && typeof error.message === 'string' ? error.message : String(error);
  }

  function reply(message, code) {
    let line;
    try {
      line = JSON.stringify(message);
    } catch (error) {
      line = JSON.stringify({error: describe(error)});
      code = 1;
    }
    process.stdout.write(prefix + line + '\n', () => process.exit(code));
  }

  async function handle(line) {
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      return reply({error: 'invalid request: ' + describe(error)}, 1);
    }

    const method = request ? request.method : undefined;
    const args = request && Array.isArray(request.args) ? request.args : [];
    if (
      typeof method !== 'string' ||
      !Object.prototype.hasOwnProperty.call(context, method) ||
      typeof context[method] !== 'function'
    ) {
      return reply({error: 'method "' + method + '" is not exported'}, 1);
    }

    try {
      const data = await context[method](...args);
      reply({data: data === undefined ? null : data}, 0);
    } catch (error) {
      reply({error: describe(error)}, 1);
    }
  }

  process.stdin.setEncoding('utf8');
  process.stdin.on('data', chunk => {
    if (state !== 'awaiting') return;
    buffer += chunk;
    const newline = buffer.indexOf('\n');
    if (newline === -1) return;
    state = 'done';
    process.stdin.pause();
    handle(buffer.slice(0, newline));
  });
  process.stdin.on('end', () => {
    if (state !== 'awaiting') return;
    state = 'done';
    if (buffer.trim()) {
      handle(buffer);
    } else {
      reply({error: 'no request received'}, 1);
    }
  });
})();
"#;

/// Render the epilogue for a module exporting `exports`.
pub fn render_epilogue(exports: &[String]) -> String {
    EPILOGUE_TEMPLATE
        .replacen(EXPORTS_PLACEHOLDER, &exports.join(", "), 1)
        .replacen(PREFIX_PLACEHOLDER, &js_string(REPLY_PREFIX), 1)
}
