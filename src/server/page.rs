//! Static control page served at `/`.
//!
//! Connects back to `/ws` on whatever host served it, prints each message's
//! `arg`, and sends the input box content as a `stdin` message.

/// Control page markup.
pub const CONTROL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>sockd</title>
    <style>
        body { font-family: monospace; margin: 1em; }
        #container p { margin: 0; white-space: pre-wrap; }
        .stderr { color: #b00; }
    </style>
</head>
<body>
    <form id="stdinform">
        <label for="stdinfield">Stdin</label>
        <input type="text" id="stdinfield" autocomplete="off"/>
        <button type="submit" id="sendBtn">Send</button>
    </form>
    <div id="container"></div>

    <script>
        (function () {
            var container = document.getElementById("container");

            function append(text, cls) {
                var p = document.createElement("p");
                p.textContent = text;
                if (cls) { p.className = cls; }
                container.appendChild(p);
            }

            if (window.WebSocket === undefined) {
                append("Your browser does not support WebSockets");
                return;
            }

            var socket = new WebSocket("ws://" + window.location.host + "/ws");
            socket.onopen = function () { append("Socket is open"); };
            socket.onclose = function () { append("Socket closed"); };
            socket.onmessage = function (e) {
                var parsed = JSON.parse(e.data);
                append(parsed.arg, parsed.type);
            };

            document.getElementById("stdinform").onsubmit = function (e) {
                e.preventDefault();
                var field = document.getElementById("stdinfield");
                socket.send(JSON.stringify({ type: "stdin", arg: field.value }));
                field.value = "";
            };
        })();
    </script>
</body>
</html>
"#;
